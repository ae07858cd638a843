//! Postgres storage backend for the data-capture engine. See `SPEC_FULL.md`
//! at the workspace root for the component design this crate implements.

pub mod postgres;

pub use postgres::{connect, PostgresGateway};

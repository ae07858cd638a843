//! Domain model, error taxonomy, and storage-agnostic service contract for
//! the versioned data-capture engine. See `SPEC_FULL.md` at the workspace
//! root for the full component design this crate implements the pure half
//! of; `capture-storage` provides the Postgres-backed implementation of
//! [`service::DataCaptureService`].

pub mod clock;
pub mod context;
pub mod error;
pub mod model;
pub mod service;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use error::CaptureError;
pub use service::DataCaptureService;
pub use value::{CaptureValue, DataType};

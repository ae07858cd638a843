//! Postgres-backed implementation of the data capture engine.
//!
//! Mirrors the split the teacher uses: `schema`/`orm` hold the raw diesel
//! mapping, the named components (`dictionary`, `resolver`, `versioner`,
//! `reader`) hold the business rules, and `gateway` is the only place a
//! transaction is opened. No component here begins, commits, or rolls back a
//! transaction itself — each receives whichever connection its caller holds,
//! so they compose freely inside `gateway`'s transactions.

use diesel::{Connection, PgConnection};
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use capture_core::error::CaptureError;

pub mod dictionary;
pub mod error;
pub mod gateway;
pub mod orm;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod versioner;

#[cfg(any(test, feature = "testing"))]
pub mod db_fixtures;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use gateway::PostgresGateway;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/");

/// Opens a connection pool to `db_url` and applies any pending migrations.
pub async fn connect(db_url: &str) -> Result<Pool<AsyncPgConnection>, CaptureError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    let pool = Pool::builder(config)
        .build()
        .map_err(|err| CaptureError::Storage(format!("failed to build connection pool: {err}")))?;
    run_migrations(db_url)?;
    Ok(pool)
}

fn run_migrations(db_url: &str) -> Result<(), CaptureError> {
    info!("applying pending migrations");
    let mut conn = PgConnection::establish(db_url)
        .map_err(|err| CaptureError::Storage(format!("could not connect for migrations: {err}")))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| CaptureError::Storage(format!("migrations failed: {err}")))?;
    Ok(())
}

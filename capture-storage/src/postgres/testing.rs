//! Reusable components for writing tests against a real Postgres database.
//!
//! Adapted from the teacher's own `postgres::testing` module: tests that need
//! to commit data (rather than rely on a rolled-back test transaction) run
//! through [`run_against_db`], which truncates every table afterwards so the
//! next test starts from a clean slate.

use diesel::sql_query;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection, RunQueryDsl,
};
use std::future::Future;

async fn setup_pool() -> Pool<AsyncPgConnection> {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run storage tests");
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder(config).build().expect("pool builds")
}

/// Truncates every table in dependency order. Keep in sync with the
/// migration's `CREATE TABLE` list.
async fn teardown(conn: &mut AsyncPgConnection) {
    let tables = [
        "audit_event",
        "capture_data_version",
        "capture_data",
        "context_group_item",
        "context_group",
        "field_definition_version",
        "field_definition",
    ];
    for table in tables {
        sql_query(format!("DELETE FROM {table};"))
            .execute(conn)
            .await
            .unwrap_or_else(|_| panic!("failed truncating {table}"));
    }
}

/// Runs `test_f` against a freshly obtained connection pool pointed at
/// `DATABASE_URL`, then truncates all tables regardless of whether the test
/// panicked.
///
/// Prefer this only for scenarios that genuinely need committed data (e.g.
/// asserting the serialization behavior of `SELECT ... FOR UPDATE` across two
/// connections); most tests can run inside a single connection's test
/// transaction instead.
pub async fn run_against_db<F, Fut>(test_f: F)
where
    F: FnOnce(Pool<AsyncPgConnection>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let pool = setup_pool().await;
    let inner = pool.clone();
    let result = tokio::spawn(async move {
        test_f(inner).await;
    })
    .await;

    let mut conn = pool.get().await.expect("connection for teardown");
    teardown(&mut conn).await;

    if let Err(err) = result {
        std::panic::resume_unwind(err.into_panic());
    }
}

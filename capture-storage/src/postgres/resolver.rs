//! Context Resolver component (spec.md §4.2).

use chrono::NaiveDateTime;
use diesel_async::AsyncPgConnection;

use capture_core::{context, error::CaptureError, model::ContextGroup};

use super::{
    error::from_diesel,
    orm::{ContextGroupRow, NewContextGroup, NewContextGroupItem},
};

/// Finds the context group identified by `pairs` under `application`,
/// creating it (and its business-key items) if this is the first time the
/// combination has been seen.
///
/// A concurrent insert racing this one loses to the unique index on
/// `(application, fingerprint)`; the caller is expected to retry once on a
/// resulting `Conflict` (spec.md §4.2, §4.5).
pub async fn resolve(
    conn: &mut AsyncPgConnection,
    application: &str,
    pairs: &[(String, String)],
    now: NaiveDateTime,
) -> Result<ContextGroup, CaptureError> {
    let canonical = context::canonicalize(pairs)?;
    let fingerprint = context::fingerprint(application, &canonical);

    if let Some(existing) = ContextGroupRow::find_by_fingerprint(conn, application, &fingerprint)
        .await
        .map_err(|e| from_diesel(e, "ContextGroup", &fingerprint))?
    {
        return Ok(into_domain(existing));
    }

    let row = NewContextGroup {
        application,
        fingerprint: &fingerprint,
        created_at: now,
    }
    .insert(conn)
    .await
    .map_err(|e| from_diesel(e, "ContextGroup", &fingerprint))?;

    let items: Vec<NewContextGroupItem> = canonical
        .iter()
        .map(|(key, value)| NewContextGroupItem {
            context_group_id: row.id,
            key,
            value,
        })
        .collect();
    NewContextGroupItem::insert_all(&items, conn)
        .await
        .map_err(|e| from_diesel(e, "ContextGroupItem", &fingerprint))?;

    Ok(into_domain(row))
}

/// Finds the context group identified by `pairs` under `application` without
/// creating it. Read paths (spec.md §4.4) must use this rather than
/// `resolve`: a read has no business inserting a row, and without an
/// enclosing transaction a `resolve` from two concurrent readers of the same
/// brand-new context can race the unique-index insert and surface a raw
/// `Conflict`.
pub async fn find(
    conn: &mut AsyncPgConnection,
    application: &str,
    pairs: &[(String, String)],
) -> Result<Option<ContextGroup>, CaptureError> {
    let canonical = context::canonicalize(pairs)?;
    let fingerprint = context::fingerprint(application, &canonical);

    let existing = ContextGroupRow::find_by_fingerprint(conn, application, &fingerprint)
        .await
        .map_err(|e| from_diesel(e, "ContextGroup", &fingerprint))?;

    Ok(existing.map(into_domain))
}

fn into_domain(row: ContextGroupRow) -> ContextGroup {
    ContextGroup {
        id: row.id,
        application: row.application,
        fingerprint: row.fingerprint,
        created_at: row.created_at,
    }
}

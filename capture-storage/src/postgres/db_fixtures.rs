//! Direct, bypass-the-component row insertion for building test
//! preconditions.
//!
//! Adapted from the teacher's own `postgres::db_fixtures` module: a test that
//! exercises `dictionary::define_field` or `resolver::resolve` must not
//! depend on that same function to set up its own fixture, or a bug there
//! could mask itself in the very test meant to catch it.

use chrono::NaiveDateTime;
use diesel_async::AsyncPgConnection;

use capture_core::{context, model::FieldDefinition, value::DataType};

use super::orm::{ContextGroupRow, NewContextGroup, NewContextGroupItem, NewFieldDefinition};

/// Inserts a `field_definition` row directly, skipping
/// `dictionary::define_field`'s find-or-update logic and version append.
pub async fn insert_field_definition(
    conn: &mut AsyncPgConnection,
    application: &str,
    field_name: &str,
    data_type: DataType,
    label: &str,
    active: bool,
    now: NaiveDateTime,
) -> FieldDefinition {
    NewFieldDefinition {
        application,
        field_name,
        data_type: data_type.to_string(),
        label,
        attributes_blob: &[],
        active,
        created_at: now,
        updated_at: now,
        created_by: "fixture",
        updated_by: "fixture",
    }
    .insert(conn)
    .await
    .expect("insert field_definition fixture")
    .into_domain()
    .expect("fixture row decodes")
}

/// Inserts a `context_group` row and its items directly, skipping
/// `resolver::resolve`'s canonicalize/fingerprint/find-or-create pipeline.
pub async fn insert_context_group(
    conn: &mut AsyncPgConnection,
    application: &str,
    pairs: &[(String, String)],
    now: NaiveDateTime,
) -> ContextGroupRow {
    let canonical = context::canonicalize(pairs).expect("fixture context is valid");
    let fingerprint = context::fingerprint(application, &canonical);

    let row = NewContextGroup { application, fingerprint: &fingerprint, created_at: now }
        .insert(conn)
        .await
        .expect("insert context_group fixture");

    let items: Vec<NewContextGroupItem> = canonical
        .iter()
        .map(|(key, value)| NewContextGroupItem { context_group_id: row.id, key, value })
        .collect();
    NewContextGroupItem::insert_all(&items, conn)
        .await
        .expect("insert context_group_item fixtures");

    row
}

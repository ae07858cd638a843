//! Field Dictionary component (spec.md §4.1).

use chrono::NaiveDateTime;
use diesel_async::AsyncPgConnection;

use capture_core::{
    error::CaptureError,
    model::{FieldDefinition, FieldDefinitionInput, FieldDefinitionSnapshot},
};

use super::{
    error::from_diesel,
    orm::{FieldDefinitionForm, FieldDefinitionRow, NewFieldDefinition, NewFieldDefinitionVersion},
};

/// Creates `(application, field_name)` if absent, otherwise updates its
/// label/type/attributes/active flag. Either way appends a
/// `FieldDefinitionVersion` row.
pub async fn define_field(
    conn: &mut AsyncPgConnection,
    application: &str,
    input: &FieldDefinitionInput,
    actor: &str,
    now: NaiveDateTime,
) -> Result<FieldDefinition, CaptureError> {
    input.validate()?;

    let existing = FieldDefinitionRow::find(conn, application, &input.field_name)
        .await
        .map_err(|e| from_diesel(e, "FieldDefinition", &input.field_name))?;

    let (previous_blob, row) = match existing {
        None => {
            let data_type = input.data_type.to_string();
            let row = NewFieldDefinition {
                application,
                field_name: &input.field_name,
                data_type,
                label: &input.label,
                attributes_blob: &input.attributes,
                active: input.active,
                created_at: now,
                updated_at: now,
                created_by: actor,
                updated_by: actor,
            }
            .insert(conn)
            .await
            .map_err(|e| from_diesel(e, "FieldDefinition", &input.field_name))?;
            (None, row)
        }
        Some(existing_row) => {
            let previous = FieldDefinitionSnapshot::from_definition(
                &existing_row.clone().into_domain()?,
            );
            let row = FieldDefinitionForm {
                data_type: input.data_type.to_string(),
                label: &input.label,
                attributes_blob: &input.attributes,
                active: input.active,
                updated_at: now,
                updated_by: actor,
            }
            .apply(conn, existing_row.id)
            .await
            .map_err(|e| from_diesel(e, "FieldDefinition", &input.field_name))?;
            (Some(previous.to_blob()), row)
        }
    };

    let definition = row.into_domain()?;
    let new_blob = FieldDefinitionSnapshot::from_definition(&definition).to_blob();

    NewFieldDefinitionVersion {
        field_definition_id: definition.id,
        effective_from: now,
        actor,
        change_description: None,
        previous_blob: previous_blob.as_deref(),
        new_blob: &new_blob,
    }
    .insert(conn)
    .await
    .map_err(|e| from_diesel(e, "FieldDefinitionVersion", &input.field_name))?;

    Ok(definition)
}

/// Bulk lookup used by the Reader and the Value Versioner.
pub async fn lookup(
    conn: &mut AsyncPgConnection,
    application: &str,
    field_names: Option<&[String]>,
) -> Result<Vec<FieldDefinition>, CaptureError> {
    let rows = FieldDefinitionRow::list(conn, application, field_names)
        .await
        .map_err(|e| from_diesel(e, "FieldDefinition", application))?;
    rows.into_iter().map(FieldDefinitionRow::into_domain).collect()
}

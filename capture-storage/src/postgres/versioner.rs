//! Value Versioner component (spec.md §4.3).

use chrono::NaiveDateTime;
use diesel_async::AsyncPgConnection;
use tracing::warn;

use capture_core::{
    error::CaptureError,
    model::{FieldDefinition, FieldSave, FieldSaveResult, SaveDefaults},
};

use super::{
    error::from_diesel,
    orm::{CaptureDataForm, CaptureDataRow, NewCaptureData, NewCaptureDataVersion},
};

/// Saves one field's new value into its `(context_group, field)` hot row,
/// appending the corresponding immutable version row.
///
/// Follows spec.md §4.3's seven steps: resolve the field (caller-supplied),
/// type-check the value, lock the hot row, compute the next sequence number,
/// insert the version row, upsert the hot row to point at it, and return the
/// outcome. Steps 3-6 run under the row lock taken in step 3 so that two
/// concurrent saves of the same pair serialize instead of racing.
pub async fn save_field(
    conn: &mut AsyncPgConnection,
    context_group_id: i64,
    definition: &FieldDefinition,
    save: &FieldSave,
    defaults: &SaveDefaults,
    actor: &str,
    now: NaiveDateTime,
) -> Result<FieldSaveResult, CaptureError> {
    if !definition.active {
        warn!(
            application = %definition.application,
            field = %definition.field_name,
            "rejected save_record for inactive field"
        );
        return Err(CaptureError::InactiveField {
            application: definition.application.clone(),
            field: definition.field_name.clone(),
        });
    }
    save.value.ensure_matches(definition.data_type)?;
    let (value_string, value_number) = save.value.clone().into_slots();

    let existing = CaptureDataRow::lock_for_pair(conn, context_group_id, definition.id)
        .await
        .map_err(|e| from_diesel(e, "CaptureDatum", &definition.field_name))?;

    let reason = save.reason.clone().or_else(|| defaults.reason.clone());
    let event_type = save.event_type.clone().or_else(|| defaults.event_type.clone());
    let signature_type = save
        .signature_type
        .clone()
        .or_else(|| defaults.signature_type.clone());

    let (hot_row_id, next_seq) = match &existing {
        Some(row) => (row.id, row.current_version_num + 1),
        None => {
            let row = NewCaptureData {
                field_definition_id: definition.id,
                context_group_id,
                value_string: None,
                value_number: None,
                current_version_id: None,
                current_version_num: 0,
                created_at: now,
                updated_at: now,
            }
            .insert(conn)
            .await
            .map_err(|e| from_diesel(e, "CaptureDatum", &definition.field_name))?;
            (row.id, 1)
        }
    };

    let version_row = NewCaptureDataVersion {
        capture_data_id: hot_row_id,
        sequential_version_num: next_seq,
        value_string_versioned: value_string.clone(),
        value_number_versioned: value_number.clone(),
        changed_at: now,
        changed_by: actor,
        change_reason: reason.as_deref(),
        signature_type: signature_type.as_deref(),
        event_type: event_type.as_deref(),
    }
    .insert(conn)
    .await
    .map_err(|e| from_diesel(e, "CaptureDatumVersion", &definition.field_name))?;

    CaptureDataForm {
        value_string,
        value_number,
        current_version_id: Some(version_row.id),
        current_version_num: next_seq,
        updated_at: now,
    }
    .apply(conn, hot_row_id)
    .await
    .map_err(|e| from_diesel(e, "CaptureDatum", &definition.field_name))?;

    Ok(FieldSaveResult {
        field_name: definition.field_name.clone(),
        capture_data_id: hot_row_id,
        version_id: version_row.id,
        sequential_version_num: next_seq,
    })
}

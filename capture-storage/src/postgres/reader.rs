//! Reader component (spec.md §4.4).

use std::collections::BTreeMap;

use diesel_async::AsyncPgConnection;

use capture_core::{
    error::CaptureError,
    model::{FieldDefinition, FieldView, VersionRecord},
};

use super::{error::from_diesel, orm::CaptureDataRow, orm::CaptureDataVersionRow};

/// Builds the current-value view for every requested field (or every field
/// known to the application, if `field_names` is `None`) within one resolved
/// context. Fields with no hot row yet are still reported, with `value: None`
/// — a field can be defined without ever having been saved in this context.
pub async fn get_record(
    conn: &mut AsyncPgConnection,
    context_group_id: i64,
    definitions: &[FieldDefinition],
) -> Result<BTreeMap<String, FieldView>, CaptureError> {
    let ids: Vec<i64> = definitions.iter().map(|d| d.id).collect();
    let rows = CaptureDataRow::find_for_context(conn, context_group_id, &ids)
        .await
        .map_err(|e| from_diesel(e, "CaptureDatum", "record"))?;

    let mut by_field: BTreeMap<i64, CaptureDataRow> =
        rows.into_iter().map(|r| (r.field_definition_id, r)).collect();

    let mut views = BTreeMap::new();
    for def in definitions {
        let row = by_field.remove(&def.id);
        let view = match row {
            Some(row) => {
                let value = capture_core::CaptureValue::from_slots(
                    def.data_type,
                    row.value_string.clone(),
                    row.value_number.clone(),
                )?;
                FieldView {
                    field_name: def.field_name.clone(),
                    value,
                    label: def.label.clone(),
                    data_type: def.data_type,
                    attributes: def.attributes.clone(),
                    version: Some(row.current_version_num),
                    updated_at: Some(row.updated_at),
                    hot_row_id: Some(row.id),
                    version_id: row.current_version_id,
                }
            }
            None => FieldView {
                field_name: def.field_name.clone(),
                value: None,
                label: def.label.clone(),
                data_type: def.data_type,
                attributes: def.attributes.clone(),
                version: None,
                updated_at: None,
                hot_row_id: None,
                version_id: None,
            },
        };
        views.insert(def.field_name.clone(), view);
    }

    Ok(views)
}

/// Full chronological history of one field's saves within one context,
/// oldest first.
pub async fn get_field_audit_trail(
    conn: &mut AsyncPgConnection,
    context_group_id: i64,
    definition: &FieldDefinition,
) -> Result<Vec<VersionRecord>, CaptureError> {
    let hot_rows = CaptureDataRow::find_for_context(conn, context_group_id, &[definition.id])
        .await
        .map_err(|e| from_diesel(e, "CaptureDatum", &definition.field_name))?;

    let Some(hot_row) = hot_rows.into_iter().next() else {
        return Ok(Vec::new());
    };

    let versions = CaptureDataVersionRow::history_for(conn, hot_row.id)
        .await
        .map_err(|e| from_diesel(e, "CaptureDatumVersion", &definition.field_name))?;

    versions
        .into_iter()
        .map(|v| {
            let value = capture_core::CaptureValue::from_slots(
                definition.data_type,
                v.value_string_versioned,
                v.value_number_versioned,
            )?;
            Ok(VersionRecord {
                sequential_version_num: v.sequential_version_num,
                value,
                changed_at: v.changed_at,
                actor: v.changed_by,
                change_reason: v.change_reason,
                event_type: v.event_type,
                signature_type: v.signature_type,
            })
        })
        .collect()
}

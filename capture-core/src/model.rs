use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::value::{CaptureValue, DataType};

/// Identity of a typed slot within an application. See spec.md §3.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub id: i64,
    pub application: String,
    pub field_name: String,
    pub data_type: DataType,
    pub label: String,
    pub attributes: Vec<u8>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: String,
    pub updated_by: String,
}

/// Caller-supplied shape for `defineField`. Only the structured form is
/// specified — see spec.md §9.
///
/// `active` defaults to `true` for newly defined fields; re-defining an
/// existing field with `active: false` is how a field is deactivated
/// (spec.md §3/§4.1), which then makes every subsequent `saveRecord` against
/// it fail with `InactiveField`.
#[derive(Debug, Clone)]
pub struct FieldDefinitionInput {
    pub field_name: String,
    pub data_type: DataType,
    pub label: String,
    pub attributes: Vec<u8>,
    pub active: bool,
}

impl FieldDefinitionInput {
    pub fn validate(&self) -> Result<(), crate::error::CaptureError> {
        use crate::error::CaptureError;
        if self.field_name.trim().is_empty() {
            return Err(CaptureError::InvalidInput("field_name is required".into()));
        }
        if self.label.trim().is_empty() {
            return Err(CaptureError::InvalidInput("label is required".into()));
        }
        Ok(())
    }
}

impl Default for FieldDefinitionInput {
    fn default() -> Self {
        Self {
            field_name: String::new(),
            data_type: DataType::String,
            label: String::new(),
            attributes: Vec::new(),
            active: true,
        }
    }
}

/// The full state captured into a `FieldDefinitionVersion`'s previous/new
/// blob. Opaque to the core beyond this struct — see spec.md §9 on dynamic
/// attribute bags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinitionSnapshot {
    pub data_type: DataType,
    pub label: String,
    pub attributes: Vec<u8>,
    pub active: bool,
}

impl FieldDefinitionSnapshot {
    pub fn from_definition(def: &FieldDefinition) -> Self {
        Self {
            data_type: def.data_type,
            label: def.label.clone(),
            attributes: def.attributes.clone(),
            active: def.active,
        }
    }

    pub fn to_blob(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("FieldDefinitionSnapshot always serializes")
    }
}

/// Append-only history of a field definition's changes.
#[derive(Debug, Clone)]
pub struct FieldDefinitionVersion {
    pub id: i64,
    pub field_definition_id: i64,
    pub effective_from: NaiveDateTime,
    pub actor: String,
    pub change_description: Option<String>,
    pub previous_blob: Option<Vec<u8>>,
    pub new_blob: Vec<u8>,
}

/// The resolved persistent identity of a set of business keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextGroup {
    pub id: i64,
    pub application: String,
    pub fingerprint: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextGroupItem {
    pub id: i64,
    pub context_group_id: i64,
    pub key: String,
    pub value: String,
}

/// The hot row: current active version for a `(context group, field)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDatum {
    pub id: i64,
    pub field_definition_id: i64,
    pub context_group_id: i64,
    pub value_string: Option<String>,
    pub value_number: Option<BigDecimal>,
    pub current_version_id: Option<i64>,
    pub current_version_num: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CaptureDatum {
    pub fn value(&self, data_type: DataType) -> Result<Option<CaptureValue>, crate::error::CaptureError> {
        CaptureValue::from_slots(data_type, self.value_string.clone(), self.value_number.clone())
    }
}

/// One immutable save of a field in a context; sequentially numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDatumVersion {
    pub id: i64,
    pub capture_data_id: i64,
    pub sequential_version_num: i32,
    pub value_string_versioned: Option<String>,
    pub value_number_versioned: Option<BigDecimal>,
    pub changed_at: NaiveDateTime,
    pub changed_by: String,
    pub change_reason: Option<String>,
    pub signature_type: Option<String>,
    pub event_type: Option<String>,
}

impl CaptureDatumVersion {
    pub fn value(&self, data_type: DataType) -> Result<Option<CaptureValue>, crate::error::CaptureError> {
        CaptureValue::from_slots(
            data_type,
            self.value_string_versioned.clone(),
            self.value_number_versioned.clone(),
        )
    }
}

/// Optional cross-cutting record of a `saveRecord`/`defineField` call.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub application: String,
    pub event_type: String,
    pub affected_type: String,
    pub affected_id: String,
    pub details: Vec<u8>,
}

/// A single field's requested save within a `saveRecord` batch.
#[derive(Debug, Clone)]
pub struct FieldSave {
    pub field_name: String,
    pub value: CaptureValue,
    pub reason: Option<String>,
    pub event_type: Option<String>,
    pub signature_type: Option<String>,
}

/// Batch-wide defaults applied when a `FieldSave` leaves its own override
/// fields unset.
#[derive(Debug, Clone, Default)]
pub struct SaveDefaults {
    pub reason: Option<String>,
    pub event_type: Option<String>,
    pub signature_type: Option<String>,
}

/// Outcome of one field's save within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSaveResult {
    pub field_name: String,
    pub capture_data_id: i64,
    pub version_id: i64,
    pub sequential_version_num: i32,
}

/// Outcome of a whole `saveRecord` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRecordResult {
    pub context_group_id: i64,
    pub saved: Vec<FieldSaveResult>,
}

/// One field's current value as reported by `getRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub field_name: String,
    pub value: Option<CaptureValue>,
    pub label: String,
    pub data_type: DataType,
    pub attributes: Vec<u8>,
    pub version: Option<i32>,
    pub updated_at: Option<NaiveDateTime>,
    pub hot_row_id: Option<i64>,
    pub version_id: Option<i64>,
}

/// One entry in a field's audit trail, as reported by `getFieldAuditTrail`.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub sequential_version_num: i32,
    pub value: Option<CaptureValue>,
    pub changed_at: NaiveDateTime,
    pub actor: String,
    pub change_reason: Option<String>,
    pub event_type: Option<String>,
    pub signature_type: Option<String>,
}

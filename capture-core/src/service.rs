use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    error::CaptureError,
    model::{
        FieldDefinition, FieldDefinitionInput, FieldSave, FieldView, SaveDefaults,
        SaveRecordResult, VersionRecord,
    },
};

/// The public entry points of the data capture engine (spec.md §4.5/§6.2).
///
/// Storage-agnostic by design: `capture-storage::PostgresGateway` is the
/// only implementor in this repository, but downstream callers (e.g.
/// `capture-cli`) depend only on this trait so that a different backend
/// could be substituted without touching call sites.
#[async_trait]
pub trait DataCaptureService: Send + Sync {
    /// Creates or updates a field definition, appending a
    /// `FieldDefinitionVersion` row for the change.
    async fn define_field(
        &self,
        application: &str,
        input: FieldDefinitionInput,
        actor: &str,
    ) -> Result<FieldDefinition, CaptureError>;

    /// Resolves `context` to a context group, then saves every field in
    /// `fields` atomically: either all fields flip to a new version or none
    /// do.
    async fn save_record(
        &self,
        application: &str,
        context: &[(String, String)],
        fields: Vec<FieldSave>,
        actor: &str,
        defaults: SaveDefaults,
    ) -> Result<SaveRecordResult, CaptureError>;

    /// Current values for a context, joined with the dictionary. Fields with
    /// no captured value are still returned (`value: None`) as long as they
    /// are named or `field_names` is `None`.
    async fn get_record(
        &self,
        application: &str,
        context: &[(String, String)],
        field_names: Option<Vec<String>>,
    ) -> Result<BTreeMap<String, FieldView>, CaptureError>;

    /// The full, sequence-ordered change history of one field within a
    /// context.
    async fn get_field_audit_trail(
        &self,
        application: &str,
        context: &[(String, String)],
        field_name: &str,
    ) -> Result<Vec<VersionRecord>, CaptureError>;
}

use capture_core::error::CaptureError;

/// Converts a raw diesel error into the outward taxonomy.
///
/// `entity`/`id` are used only to build a useful message; no driver detail
/// survives past this boundary (spec.md §7).
pub fn from_diesel(err: diesel::result::Error, entity: &str, id: &str) -> CaptureError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            details,
        ) => CaptureError::Conflict(format!(
            "{entity} '{id}' already exists ({})",
            details.message()
        )),
        diesel::result::Error::NotFound => {
            CaptureError::NotFound(format!("{entity} '{id}' not found"))
        }
        other => CaptureError::Storage(format!("{entity} '{id}': {other}")),
    }
}

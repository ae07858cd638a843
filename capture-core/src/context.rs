use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::error::CaptureError;

/// Sorts the caller-supplied business keys by key and rejects a duplicated
/// key or an empty set, per spec.md §4.2 step 1.
pub fn canonicalize(pairs: &[(String, String)]) -> Result<BTreeMap<String, String>, CaptureError> {
    if pairs.is_empty() {
        return Err(CaptureError::InvalidContext("business key set must not be empty".into()));
    }
    let mut map = BTreeMap::new();
    for (key, value) in pairs {
        if key.is_empty() {
            return Err(CaptureError::InvalidContext("business key must not be empty".into()));
        }
        if value.is_empty() {
            return Err(CaptureError::InvalidContext(format!(
                "business value for key '{key}' must not be empty"
            )));
        }
        if map.insert(key.clone(), value.clone()).is_some() {
            return Err(CaptureError::InvalidContext(format!("duplicate business key '{key}'")));
        }
    }
    Ok(map)
}

/// Computes a deterministic, collision-resistant fingerprint for a
/// canonicalized business-key set, scoped to an application.
///
/// Two resolutions of the same `(application, keys)` pair always produce the
/// same fingerprint, which backs the `(application, fingerprint)` unique
/// index described in spec.md §4.2/§6.1.
pub fn fingerprint(application: &str, canonical: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(application.as_bytes());
    for (key, value) in canonical {
        hasher.update(b"\0");
        hasher.update(key.as_bytes());
        hasher.update(b"\x01");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

use std::{fmt, str::FromStr};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// The fixed set of primitive types a field definition may declare.
///
/// Stable by design — see `SPEC_FULL.md` A.1/the data model notes on why this
/// is a native enum rather than an enum-as-table the way the teacher models
/// its chain identifiers: this set does not grow at the same rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
}

impl DataType {
    /// Every non-number type uses the string slot; only `Number` uses the
    /// numeric slot. See spec.md §6.1.
    pub fn uses_numeric_slot(self) -> bool {
        matches!(self, DataType::Number)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

impl FromStr for DataType {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(DataType::String),
            "number" => Ok(DataType::Number),
            "date" => Ok(DataType::Date),
            "boolean" => Ok(DataType::Boolean),
            other => Err(CaptureError::InvalidInput(format!("unknown data_type '{other}'"))),
        }
    }
}

/// A value supplied by a caller for one field save, tagged with its own
/// primitive kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    String(String),
    Number(BigDecimal),
    Date(NaiveDate),
    Boolean(bool),
}

impl CaptureValue {
    pub fn data_type(&self) -> DataType {
        match self {
            CaptureValue::String(_) => DataType::String,
            CaptureValue::Number(_) => DataType::Number,
            CaptureValue::Date(_) => DataType::Date,
            CaptureValue::Boolean(_) => DataType::Boolean,
        }
    }

    /// Fails if this value's own kind does not agree with the field
    /// definition's declared `data_type`. The dictionary's `data_type` is
    /// authoritative; this is the one place it is enforced.
    pub fn ensure_matches(&self, declared: DataType) -> Result<(), CaptureError> {
        if self.data_type() != declared {
            return Err(CaptureError::InvalidInput(format!(
                "value of type '{}' does not match field data_type '{}'",
                self.data_type(),
                declared
            )));
        }
        Ok(())
    }

    /// Splits into the narrow `(value_string, value_number)` pair the
    /// `capture_data`/`capture_data_version` tables carry. Exactly one side
    /// is populated, per spec.md §6.1.
    pub fn into_slots(self) -> (Option<String>, Option<BigDecimal>) {
        match self {
            CaptureValue::Number(n) => (None, Some(n)),
            CaptureValue::String(s) => (Some(s), None),
            CaptureValue::Date(d) => (Some(d.format("%Y-%m-%d").to_string()), None),
            CaptureValue::Boolean(b) => (Some(if b { "true" } else { "false" }.to_string()), None),
        }
    }

    /// Reassembles a `CaptureValue` from the stored slots given the field's
    /// declared `data_type`. Returns `Ok(None)` only for a data row that
    /// genuinely carries no value; a populated row with a slot/type mismatch
    /// is a storage-level invariant violation, surfaced as `Storage`.
    pub fn from_slots(
        data_type: DataType,
        value_string: Option<String>,
        value_number: Option<BigDecimal>,
    ) -> Result<Option<CaptureValue>, CaptureError> {
        match data_type {
            DataType::Number => Ok(value_number.map(CaptureValue::Number)),
            DataType::String => Ok(value_string.map(CaptureValue::String)),
            DataType::Boolean => value_string
                .map(|s| match s.as_str() {
                    "true" => Ok(CaptureValue::Boolean(true)),
                    "false" => Ok(CaptureValue::Boolean(false)),
                    other => Err(CaptureError::Storage(format!(
                        "invalid stored boolean literal '{other}'"
                    ))),
                })
                .transpose(),
            DataType::Date => value_string
                .map(|s| {
                    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map(CaptureValue::Date).map_err(|e| {
                        CaptureError::Storage(format!("invalid stored date literal '{s}': {e}"))
                    })
                })
                .transpose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_uses_numeric_slot_only() {
        let v = CaptureValue::Number(BigDecimal::from(5));
        let (s, n) = v.into_slots();
        assert_eq!(s, None);
        assert_eq!(n, Some(BigDecimal::from(5)));
    }

    #[test]
    fn boolean_round_trips_through_string_slot() {
        let v = CaptureValue::Boolean(true);
        let (s, n) = v.clone().into_slots();
        assert_eq!(s.as_deref(), Some("true"));
        assert_eq!(n, None);
        let back = CaptureValue::from_slots(DataType::Boolean, s, n).unwrap();
        assert_eq!(back, Some(v));
    }

    #[test]
    fn date_round_trips_as_iso8601_string() {
        let d = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let v = CaptureValue::Date(d);
        let (s, _) = v.clone().into_slots();
        assert_eq!(s.as_deref(), Some("2026-07-28"));
        let back = CaptureValue::from_slots(DataType::Date, s, None).unwrap();
        assert_eq!(back, Some(v));
    }

    #[test]
    fn mismatched_value_type_is_rejected() {
        let v = CaptureValue::String("5".into());
        assert!(v.ensure_matches(DataType::Number).is_err());
    }

    #[test]
    fn data_type_from_str_is_case_insensitive() {
        assert_eq!("NUMBER".parse::<DataType>().unwrap(), DataType::Number);
        assert!("currency".parse::<DataType>().is_err());
    }
}

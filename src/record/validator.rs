use crate::extract::{Fields, SelectorRegistry};
use crate::record::RecordStatus;

/// Classifies extracted fields as valid, partial or invalid
#[derive(Debug, Clone)]
pub struct RecordValidator {
    enabled: bool,
    required: Vec<String>,
    numeric: Vec<String>,
}

impl RecordValidator {
    pub fn new(enabled: bool, required: Vec<String>, numeric: Vec<String>) -> Self {
        Self {
            enabled,
            required,
            numeric,
        }
    }

    /// Uses the `required` and `numeric` flags declared on the registry fields
    pub fn from_registry(registry: &SelectorRegistry, enabled: bool) -> Self {
        Self::new(enabled, registry.required_fields(), registry.numeric_fields())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the status of a set of extracted fields
    ///
    /// When validation is disabled every record is `Valid`. Otherwise a
    /// present numeric field that does not parse to a finite number makes
    /// the record `Invalid`,
    /// and the share of required fields present decides between `Valid`,
    /// `Partial` and `Invalid`. With no required fields a well-formed record
    /// is `Valid`.
    pub fn validate(&self, fields: &Fields) -> RecordStatus {
        if !self.enabled {
            return RecordStatus::Valid;
        }

        let malformed = self.numeric.iter().any(|name| {
            fields
                .get(name)
                .and_then(|v| v.as_str())
                .is_some_and(|v| !v.trim().parse::<f64>().is_ok_and(f64::is_finite))
        });
        if malformed {
            return RecordStatus::Invalid;
        }

        if self.required.is_empty() {
            return RecordStatus::Valid;
        }

        let present = self
            .required
            .iter()
            .filter(|name| fields.get(*name).is_some_and(|v| v.is_present()))
            .count();

        if present == self.required.len() {
            RecordStatus::Valid
        } else if present == 0 {
            RecordStatus::Invalid
        } else {
            RecordStatus::Partial
        }
    }
}

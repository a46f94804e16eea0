//! Validation outcomes

use serde::Serialize;
use thiserror::Error;

/// Why an intent was not executed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("could not understand the date \"{text}\" for '{field}'")]
    AmbiguousDate { field: String, text: String },

    #[error("unknown venue: {reference}")]
    UnresolvableVenue { reference: String },

    #[error("{requested} occurrences requested, the limit is {max}")]
    ExceedsRecurrenceLimit { requested: u32, max: u32 },

    #[error("invalid time range: {detail}")]
    InvalidTimeRange { detail: String },

    #[error("invalid recurrence: {detail}")]
    InvalidRecurrence { detail: String },

    #[error("no changes requested")]
    EmptyChangeSet,
}

impl Rejection {
    pub fn missing(field: &str) -> Self {
        Rejection::MissingRequiredField {
            field: field.to_string(),
        }
    }
}

/// Per-intent validation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "rejection", rename_all = "snake_case")]
pub enum ValidationResult {
    Accepted,
    Rejected(Rejection),
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationResult::Accepted => None,
            ValidationResult::Rejected(r) => Some(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::missing("title").to_string(),
            "missing required field 'title'"
        );
        assert_eq!(
            Rejection::ExceedsRecurrenceLimit { requested: 500, max: 52 }.to_string(),
            "500 occurrences requested, the limit is 52"
        );
    }

    #[test]
    fn test_validation_result_json() {
        let json = serde_json::to_value(ValidationResult::Rejected(Rejection::EmptyChangeSet)).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["rejection"]["reason"], "empty_change_set");

        let json = serde_json::to_value(ValidationResult::Accepted).unwrap();
        assert_eq!(json["status"], "accepted");
    }
}

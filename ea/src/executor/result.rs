//! Execution outcomes

use serde::Serialize;

use crate::events::{Event, Venue};

/// What a successful intent changed or read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    EventsCreated { events: Vec<Event> },
    /// Empty when the filter matched nothing
    EventsUpdated { events: Vec<Event> },
    EventsListed { events: Vec<Event> },
    VenueCreated { venue: Venue },
    VenuesListed { venues: Vec<Venue> },
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::EventsCreated { events } => write!(f, "{} event(s) created", events.len()),
            Effect::EventsUpdated { events } => write!(f, "{} event(s) updated", events.len()),
            Effect::EventsListed { events } => write!(f, "{} event(s) listed", events.len()),
            Effect::VenueCreated { venue } => write!(f, "venue {} created", venue.id),
            Effect::VenuesListed { venues } => write!(f, "{} venue(s) listed", venues.len()),
        }
    }
}

/// Per-intent outcome after an execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Succeeded(Effect),
    /// `partial` lists the events written before the failure
    Failed { cause: String, partial: Vec<Event> },
    /// The earlier intent this one relies on did not produce its venue
    DependencyUnresolved { depends_on: usize },
}

impl ExecutionResult {
    pub fn failed(cause: impl Into<String>) -> Self {
        ExecutionResult::Failed {
            cause: cause.into(),
            partial: Vec::new(),
        }
    }

    pub fn partial(cause: impl Into<String>, partial: Vec<Event>) -> Self {
        ExecutionResult::Failed {
            cause: cause.into(),
            partial,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_json_shape() {
        let json = serde_json::to_value(ExecutionResult::Succeeded(Effect::EventsUpdated { events: vec![] })).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["effect"], "events_updated");
        assert!(json["events"].as_array().unwrap().is_empty());

        let json = serde_json::to_value(ExecutionResult::DependencyUnresolved { depends_on: 0 }).unwrap();
        assert_eq!(json["status"], "dependency_unresolved");
        assert_eq!(json["depends_on"], 0);
    }

    #[test]
    fn test_failed_helpers() {
        let result = ExecutionResult::failed("store offline");
        assert!(!result.is_success());
        assert!(matches!(result, ExecutionResult::Failed { ref partial, .. } if partial.is_empty()));
    }
}

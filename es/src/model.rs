//! Stored record types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Row id of an event
pub type EventId = i64;

/// Row id of a venue
pub type VenueId = i64;

/// A place where events happen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub address: Option<String>,
    pub capacity: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a venue that does not exist yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewVenue {
    pub name: String,
    pub address: Option<String>,
    pub capacity: Option<u32>,
}

/// A single scheduled event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue_id: Option<VenueId>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Length of the event
    pub fn duration(&self) -> Duration {
        self.ends_at - self.starts_at
    }
}

/// Fields for an event that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub venue_id: Option<VenueId>,
}

/// Partial update to an event; `None` leaves the column alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue_id: Option<VenueId>,
}

impl EventPatch {
    /// True when the patch would not change anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.starts_at.is_none()
            && self.ends_at.is_none()
            && self.venue_id.is_none()
    }
}

/// Criteria for listing events. All present criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    pub venue_id: Option<VenueId>,
    /// Inclusive lower bound on the start
    pub starts_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the start
    pub starts_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_duration() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let event = Event {
            id: 1,
            title: "Conference".to_string(),
            description: None,
            starts_at: start,
            ends_at: start + Duration::days(4),
            venue_id: None,
            created_at: start,
        };
        assert_eq!(event.duration(), Duration::days(4));
    }

    #[test]
    fn test_empty_patch() {
        assert!(EventPatch::default().is_empty());
        let patch = EventPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}

//! Intent variants and their fields

use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::Serialize;

use super::recurrence::RecurrenceRule;

/// A date the parser either resolved or had to give up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSpec {
    At(DateTime<FixedOffset>),
    /// Original text, kept only so the rejection can quote it
    Unresolved(String),
}

impl DateSpec {
    /// The resolved instant, if any
    pub fn resolved(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            DateSpec::At(t) => Some(*t),
            DateSpec::Unresolved(_) => None,
        }
    }
}

/// Which venue an operation refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueRef {
    /// An existing venue, looked up by name
    Named(String),
    /// The venue created by an earlier intent of the same prompt (zero-based)
    Intent(usize),
}

impl std::fmt::Display for VenueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueRef::Named(name) => write!(f, "\"{}\"", name),
            VenueRef::Intent(i) => write!(f, "venue from operation {}", i + 1),
        }
    }
}

/// Operation kind names, as used in the instruction schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CreateEvent,
    UpdateEvent,
    ListEvents,
    CreateVenue,
    ListVenues,
}

impl IntentKind {
    pub const ALL: [IntentKind; 5] = [
        IntentKind::CreateEvent,
        IntentKind::UpdateEvent,
        IntentKind::ListEvents,
        IntentKind::CreateVenue,
        IntentKind::ListVenues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CreateEvent => "create_event",
            IntentKind::UpdateEvent => "update_event",
            IntentKind::ListEvents => "list_events",
            IntentKind::CreateVenue => "create_venue",
            IntentKind::ListVenues => "list_venues",
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requested operation against the event system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    CreateEvent(CreateEvent),
    UpdateEvent(UpdateEvent),
    ListEvents(ListEvents),
    CreateVenue(CreateVenue),
    ListVenues,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::CreateEvent(_) => IntentKind::CreateEvent,
            Intent::UpdateEvent(_) => IntentKind::UpdateEvent,
            Intent::ListEvents(_) => IntentKind::ListEvents,
            Intent::CreateVenue(_) => IntentKind::CreateVenue,
            Intent::ListVenues => IntentKind::ListVenues,
        }
    }

    /// Venue references this intent needs resolved before it can run
    pub fn venue_refs(&self) -> Vec<&VenueRef> {
        match self {
            Intent::CreateEvent(c) => c.venue.iter().collect(),
            Intent::UpdateEvent(u) => u.changes.venue.iter().collect(),
            Intent::ListEvents(_) | Intent::CreateVenue(_) | Intent::ListVenues => Vec::new(),
        }
    }

    /// The venue reference this intent carries, for rewriting in place
    pub fn venue_ref_mut(&mut self) -> Option<&mut VenueRef> {
        match self {
            Intent::CreateEvent(c) => c.venue.as_mut(),
            Intent::UpdateEvent(u) => u.changes.venue.as_mut(),
            Intent::ListEvents(_) | Intent::CreateVenue(_) | Intent::ListVenues => None,
        }
    }

    /// Earlier intents whose created venue this one uses
    pub fn dependencies(&self) -> Vec<usize> {
        self.venue_refs()
            .into_iter()
            .filter_map(|r| match r {
                VenueRef::Intent(i) => Some(*i),
                VenueRef::Named(_) => None,
            })
            .collect()
    }

    /// Short human label, e.g. `create event "Book Club"`
    pub fn label(&self) -> String {
        match self {
            Intent::CreateEvent(c) => format!("create event \"{}\"", c.title),
            Intent::UpdateEvent(u) => format!("update events {}", u.filter),
            Intent::ListEvents(l) => format!("list events {}", l.filter),
            Intent::CreateVenue(v) => format!("create venue \"{}\"", v.name),
            Intent::ListVenues => "list venues".to_string(),
        }
    }
}

/// Create one event, or a series when `recurrence` is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateEvent {
    pub title: String,
    pub description: Option<String>,
    pub start: Option<DateSpec>,
    pub end: Option<DateSpec>,
    pub duration_minutes: Option<u32>,
    pub venue: Option<VenueRef>,
    pub recurrence: Option<RecurrenceRule>,
}

/// Change every event matching `filter`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateEvent {
    pub filter: EventFilter,
    pub changes: EventChanges,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListEvents {
    pub filter: EventFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateVenue {
    pub name: String,
    pub address: Option<String>,
    pub capacity: Option<u32>,
}

/// Which events an update or listing applies to; every present field must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventFilter {
    pub title_contains: Option<String>,
    /// Name of an existing venue
    pub venue: Option<String>,
    pub starts_after: Option<DateSpec>,
    pub starts_before: Option<DateSpec>,
    /// Local time of day the event starts at
    pub at_time: Option<NaiveTime>,
}

impl EventFilter {
    /// True when no criterion is set (matches every event)
    pub fn is_empty(&self) -> bool {
        self.title_contains.is_none()
            && self.venue.is_none()
            && self.starts_after.is_none()
            && self.starts_before.is_none()
            && self.at_time.is_none()
    }

    /// Dates carried by the filter, with their field names
    pub fn dates(&self) -> Vec<(&'static str, &DateSpec)> {
        let mut dates = Vec::new();
        if let Some(d) = &self.starts_after {
            dates.push(("filter.starts_after", d));
        }
        if let Some(d) = &self.starts_before {
            dates.push(("filter.starts_before", d));
        }
        dates
    }
}

impl std::fmt::Display for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(t) = &self.title_contains {
            parts.push(format!("titled \"{}\"", t));
        }
        if let Some(v) = &self.venue {
            parts.push(format!("at \"{}\"", v));
        }
        if let Some(DateSpec::At(t)) = &self.starts_after {
            parts.push(format!("from {}", t.format("%Y-%m-%d %H:%M")));
        }
        if let Some(DateSpec::At(t)) = &self.starts_before {
            parts.push(format!("before {}", t.format("%Y-%m-%d %H:%M")));
        }
        if let Some(t) = &self.at_time {
            parts.push(format!("starting at {}", t.format("%H:%M")));
        }
        if parts.is_empty() {
            write!(f, "(all)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Field changes applied by an update; `None` leaves the field alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Move the event to this start, keeping its length
    pub start: Option<DateSpec>,
    /// Move the start to this local time of day, keeping the date and length
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub venue: Option<VenueRef>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.venue.is_none()
    }
}

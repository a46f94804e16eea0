//! Intent model
//!
//! Structured operations produced by the parser from one natural-language
//! prompt. Intents live for a single request and are never persisted.

mod prompt;
mod recurrence;
mod types;

pub use prompt::{Prompt, Turn};
pub use recurrence::{Frequency, RecurrenceRule, Selector};
pub use types::{
    CreateEvent, CreateVenue, DateSpec, EventChanges, EventFilter, Intent, IntentKind, ListEvents, UpdateEvent,
    VenueRef,
};

//! EventStore - SQLite-backed event and venue storage
//!
//! A small persistent store for events and the venues they take place at.
//! Timestamps are kept in UTC; callers convert to their own offset for display.
//!
//! Inserts are never deduplicated: creating the same event twice yields two rows
//! with distinct ids.

mod error;
mod model;
mod store;

pub use error::StoreError;
pub use model::{Event, EventId, EventPatch, EventQuery, NewEvent, NewVenue, Venue, VenueId};
pub use store::Store;

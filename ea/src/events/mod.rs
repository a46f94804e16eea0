//! Event management system boundary
//!
//! The executor only sees the `EventSystem` trait. The bundled implementation
//! keeps events in a local SQLite file through the `eventstore` crate.

mod error;
mod sqlite;

pub use error::EventSystemError;
pub use eventstore::{Event, EventId, EventPatch, EventQuery, NewEvent, NewVenue, Venue, VenueId};
pub use sqlite::SqliteEventSystem;

use async_trait::async_trait;

/// Operations the assistant can perform against the event system
#[async_trait]
pub trait EventSystem: Send + Sync {
    async fn create_event(&self, event: NewEvent) -> Result<Event, EventSystemError>;

    async fn update_event(&self, id: EventId, patch: EventPatch) -> Result<Event, EventSystemError>;

    /// Events matching `query`, earliest first
    async fn list_events(&self, query: EventQuery) -> Result<Vec<Event>, EventSystemError>;

    async fn create_venue(&self, venue: NewVenue) -> Result<Venue, EventSystemError>;

    async fn list_venues(&self) -> Result<Vec<Venue>, EventSystemError>;

    /// Venue with this name, ignoring case
    async fn find_venue(&self, name: &str) -> Result<Option<Venue>, EventSystemError>;
}

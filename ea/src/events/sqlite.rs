//! EventSystem over the local SQLite store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventstore::{Event, EventId, EventPatch, EventQuery, NewEvent, NewVenue, Store, StoreError, Venue};
use tracing::{debug, warn};

use super::{EventSystem, EventSystemError};
use crate::config::StoreConfig;

/// Local event system backed by `eventstore::Store`
///
/// The connection is not `Sync`, so it sits behind a mutex and every call runs
/// on the blocking pool.
#[derive(Clone)]
pub struct SqliteEventSystem {
    store: Arc<Mutex<Store>>,
    read_only: bool,
}

impl SqliteEventSystem {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            read_only: false,
        }
    }

    /// Open the store named in config, creating it if needed
    pub fn open(config: &StoreConfig) -> Result<Self, EventSystemError> {
        debug!(path = %config.path.display(), read_only = %config.read_only, "SqliteEventSystem::open: called");
        let store = Store::open(&config.path)?;
        Ok(Self::new(store).with_read_only(config.read_only))
    }

    pub fn in_memory() -> Result<Self, EventSystemError> {
        Ok(Self::new(Store::open_in_memory()?))
    }

    /// Refuse every write with `PermissionDenied`
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn check_writable(&self, op: &str) -> Result<(), EventSystemError> {
        if self.read_only {
            warn!(%op, "SqliteEventSystem: write refused, store is read-only");
            return Err(EventSystemError::PermissionDenied(format!("{} on a read-only store", op)));
        }
        Ok(())
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, EventSystemError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|_| EventSystemError::Unavailable(format!("{}: store lock poisoned", op)))?;
            f(&guard).map_err(EventSystemError::from)
        })
        .await
        .map_err(|e| EventSystemError::Unavailable(format!("{}: {}", op, e)))?
    }
}

#[async_trait]
impl EventSystem for SqliteEventSystem {
    async fn create_event(&self, event: NewEvent) -> Result<Event, EventSystemError> {
        debug!(title = %event.title, starts_at = %event.starts_at, "SqliteEventSystem::create_event: called");
        self.check_writable("create_event")?;
        self.run("create_event", move |store| store.create_event(&event)).await
    }

    async fn update_event(&self, id: EventId, patch: EventPatch) -> Result<Event, EventSystemError> {
        debug!(%id, "SqliteEventSystem::update_event: called");
        self.check_writable("update_event")?;
        self.run("update_event", move |store| store.update_event(id, &patch)).await
    }

    async fn list_events(&self, query: EventQuery) -> Result<Vec<Event>, EventSystemError> {
        debug!(?query, "SqliteEventSystem::list_events: called");
        self.run("list_events", move |store| store.list_events(&query)).await
    }

    async fn create_venue(&self, venue: NewVenue) -> Result<Venue, EventSystemError> {
        debug!(name = %venue.name, "SqliteEventSystem::create_venue: called");
        self.check_writable("create_venue")?;
        self.run("create_venue", move |store| store.create_venue(&venue)).await
    }

    async fn list_venues(&self) -> Result<Vec<Venue>, EventSystemError> {
        debug!("SqliteEventSystem::list_venues: called");
        self.run("list_venues", |store| store.list_venues()).await
    }

    async fn find_venue(&self, name: &str) -> Result<Option<Venue>, EventSystemError> {
        debug!(%name, "SqliteEventSystem::find_venue: called");
        let name = name.to_string();
        self.run("find_venue", move |store| store.find_venue_by_name(&name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn new_event(title: &str) -> NewEvent {
        let start = Utc.with_ymd_and_hms(2026, 11, 3, 19, 0, 0).unwrap();
        NewEvent {
            title: title.to_string(),
            description: None,
            starts_at: start,
            ends_at: start + chrono::Duration::hours(2),
            venue_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let system = SqliteEventSystem::in_memory().unwrap();
        system.create_event(new_event("Book Club")).await.unwrap();
        system.create_event(new_event("Book Club")).await.unwrap();

        let events = system.list_events(EventQuery::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].id, events[1].id);
    }

    #[tokio::test]
    async fn test_find_venue() {
        let system = SqliteEventSystem::in_memory().unwrap();
        system
            .create_venue(NewVenue {
                name: "Main Hall".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(system.find_venue("main hall").await.unwrap().is_some());
        assert!(system.find_venue("Annex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_event_is_not_found() {
        let system = SqliteEventSystem::in_memory().unwrap();
        let patch = EventPatch {
            title: Some("x".to_string()),
            ..Default::default()
        };
        let err = system.update_event(99, patch).await.unwrap_err();
        assert!(matches!(err, EventSystemError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_only_refuses_writes() {
        let system = SqliteEventSystem::in_memory().unwrap().with_read_only(true);
        let err = system.create_event(new_event("Gala")).await.unwrap_err();
        assert!(matches!(err, EventSystemError::PermissionDenied(_)));
        let err = system.create_venue(NewVenue::default()).await.unwrap_err();
        assert!(matches!(err, EventSystemError::PermissionDenied(_)));
        assert!(system.list_events(EventQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_from_config() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            path: dir.path().join("nested").join("events.db"),
            read_only: false,
        };
        let system = SqliteEventSystem::open(&config).unwrap();
        system.create_event(new_event("Gala")).await.unwrap();

        let reopened = SqliteEventSystem::open(&config).unwrap();
        assert_eq!(reopened.list_events(EventQuery::default()).await.unwrap().len(), 1);
    }
}

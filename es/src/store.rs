//! SQLite store implementation

use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{Event, EventId, EventPatch, EventQuery, NewEvent, NewVenue, Venue, VenueId};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS venues (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    address     TEXT,
    capacity    INTEGER,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT,
    starts_at   TEXT NOT NULL,
    ends_at     TEXT NOT NULL,
    venue_id    INTEGER REFERENCES venues(id),
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_starts_at ON events(starts_at);
CREATE INDEX IF NOT EXISTS idx_events_venue ON events(venue_id);
"#;

const EVENT_COLUMNS: &str = "id, title, description, starts_at, ends_at, venue_id, created_at";
const VENUE_COLUMNS: &str = "id, name, address, capacity, created_at";

/// Timestamps are stored as second-precision UTC RFC 3339, which sorts lexically
fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Like [`to_db_time`], but refuses values outside four-digit years, whose
/// text would neither sort nor parse back
fn to_stored_time(field: &str, t: &DateTime<Utc>) -> Result<String, StoreError> {
    if !(0..=9999).contains(&t.year()) {
        return Err(StoreError::InvalidData(format!("{} {} is outside years 0000-9999", field, t)));
    }
    Ok(to_db_time(t))
}

fn from_db_time(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("timestamp '{}': {}", s, e)))
}

/// Escape LIKE wildcards so titles match literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Row as read from SQLite, before timestamp parsing
struct EventRow {
    id: EventId,
    title: String,
    description: Option<String>,
    starts_at: String,
    ends_at: String,
    venue_id: Option<VenueId>,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            starts_at: row.get(3)?,
            ends_at: row.get(4)?,
            venue_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_event(self) -> Result<Event, StoreError> {
        Ok(Event {
            id: self.id,
            title: self.title,
            description: self.description,
            starts_at: from_db_time(&self.starts_at)?,
            ends_at: from_db_time(&self.ends_at)?,
            venue_id: self.venue_id,
            created_at: from_db_time(&self.created_at)?,
        })
    }
}

struct VenueRow {
    id: VenueId,
    name: String,
    address: Option<String>,
    capacity: Option<u32>,
    created_at: String,
}

impl VenueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            capacity: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_venue(self) -> Result<Venue, StoreError> {
        Ok(Venue {
            id: self.id,
            name: self.name,
            address: self.address,
            capacity: self.capacity,
            created_at: from_db_time(&self.created_at)?,
        })
    }
}

/// Event and venue store over a single SQLite connection
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Store::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "Store::open: ready");
        Ok(store)
    }

    /// Open a throwaway store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Store::open_in_memory: called");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a venue and return the stored row
    pub fn create_venue(&self, venue: &NewVenue) -> Result<Venue, StoreError> {
        debug!(name = %venue.name, "Store::create_venue: called");
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO venues (name, address, capacity, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![venue.name, venue.address, venue.capacity, to_db_time(&now)],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(%id, "Store::create_venue: inserted");
        self.get_venue(id)
    }

    /// Fetch a venue by id
    pub fn get_venue(&self, id: VenueId) -> Result<Venue, StoreError> {
        debug!(%id, "Store::get_venue: called");
        let sql = format!("SELECT {} FROM venues WHERE id = ?1", VENUE_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], VenueRow::from_row)
            .optional()?
            .ok_or(StoreError::NotFound { entity: "venue", id })?;
        row.into_venue()
    }

    /// Find a venue by name, ignoring case and surrounding whitespace
    pub fn find_venue_by_name(&self, name: &str) -> Result<Option<Venue>, StoreError> {
        debug!(%name, "Store::find_venue_by_name: called");
        let sql = format!(
            "SELECT {} FROM venues WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            VENUE_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![name.trim()], VenueRow::from_row)
            .optional()?;
        row.map(VenueRow::into_venue).transpose()
    }

    /// All venues, alphabetical
    pub fn list_venues(&self) -> Result<Vec<Venue>, StoreError> {
        debug!("Store::list_venues: called");
        let sql = format!("SELECT {} FROM venues ORDER BY name COLLATE NOCASE, id", VENUE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], VenueRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(VenueRow::into_venue).collect()
    }

    /// Insert an event and return the stored row
    pub fn create_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        debug!(title = %event.title, starts_at = %event.starts_at, "Store::create_event: called");
        let starts_at = to_stored_time("starts_at", &event.starts_at)?;
        let ends_at = to_stored_time("ends_at", &event.ends_at)?;
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO events (title, description, starts_at, ends_at, venue_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.title,
                event.description,
                starts_at,
                ends_at,
                event.venue_id,
                to_db_time(&now),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(%id, "Store::create_event: inserted");
        self.get_event(id)
    }

    /// Fetch an event by id
    pub fn get_event(&self, id: EventId) -> Result<Event, StoreError> {
        debug!(%id, "Store::get_event: called");
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], EventRow::from_row)
            .optional()?
            .ok_or(StoreError::NotFound { entity: "event", id })?;
        row.into_event()
    }

    /// Apply a patch to an event and return the updated row
    pub fn update_event(&self, id: EventId, patch: &EventPatch) -> Result<Event, StoreError> {
        debug!(%id, ?patch, "Store::update_event: called");
        let mut event = self.get_event(id)?;
        if patch.is_empty() {
            debug!("Store::update_event: empty patch, nothing to do");
            return Ok(event);
        }

        if let Some(title) = &patch.title {
            event.title = title.clone();
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(starts_at) = patch.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            event.ends_at = ends_at;
        }
        if let Some(venue_id) = patch.venue_id {
            event.venue_id = Some(venue_id);
        }

        let starts_at = to_stored_time("starts_at", &event.starts_at)?;
        let ends_at = to_stored_time("ends_at", &event.ends_at)?;
        self.conn.execute(
            "UPDATE events SET title = ?1, description = ?2, starts_at = ?3, ends_at = ?4, venue_id = ?5 \
             WHERE id = ?6",
            params![
                event.title,
                event.description,
                starts_at,
                ends_at,
                event.venue_id,
                id,
            ],
        )?;
        Ok(event)
    }

    /// Events matching every criterion in the query, ordered by start
    pub fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        debug!(?query, "Store::list_events: called");
        let mut sql = format!("SELECT {} FROM events WHERE 1 = 1", EVENT_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        if let Some(title) = &query.title_contains {
            args.push(Value::Text(format!("%{}%", escape_like(title.trim()))));
            sql.push_str(&format!(" AND title LIKE ?{} ESCAPE '\\'", args.len()));
        }
        if let Some(venue_id) = query.venue_id {
            args.push(Value::Integer(venue_id));
            sql.push_str(&format!(" AND venue_id = ?{}", args.len()));
        }
        if let Some(after) = &query.starts_after {
            args.push(Value::Text(to_db_time(after)));
            sql.push_str(&format!(" AND starts_at >= ?{}", args.len()));
        }
        if let Some(before) = &query.starts_before {
            args.push(Value::Text(to_db_time(before)));
            sql.push_str(&format!(" AND starts_at < ?{}", args.len()));
        }
        sql.push_str(" ORDER BY starts_at, id");
        if let Some(limit) = query.limit {
            args.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", args.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), EventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let events = rows.into_iter().map(EventRow::into_event).collect::<Result<Vec<_>, _>>()?;
        debug!(count = %events.len(), "Store::list_events: done");
        Ok(events)
    }
}

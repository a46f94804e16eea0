//! Intent execution
//!
//! Runs accepted intents against the event system one at a time, in prompt
//! order. Failures are captured per intent and never stop later intents.

mod result;

pub use result::{Effect, ExecutionResult};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::events::{Event, EventPatch, EventQuery, EventSystem, EventSystemError, NewEvent, NewVenue, VenueId};
use crate::intent::{CreateEvent, CreateVenue, DateSpec, EventFilter, Intent, UpdateEvent, VenueRef};

/// Ends an intent early with its final result
type Halt = ExecutionResult;

/// Executes the intents of one prompt
///
/// Remembers the venues created so far so later intents can refer to them;
/// build a fresh one per prompt.
pub struct Executor {
    events: Arc<dyn EventSystem>,
    limits: Limits,
    created_venues: HashMap<usize, VenueId>,
}

impl Executor {
    pub fn new(events: Arc<dyn EventSystem>, limits: Limits) -> Self {
        Self {
            events,
            limits,
            created_venues: HashMap::new(),
        }
    }

    /// Execute the intent at position `index`
    pub async fn execute(&mut self, index: usize, intent: &Intent) -> ExecutionResult {
        debug!(%index, kind = %intent.kind(), "Executor::execute: called");
        let outcome = match intent {
            Intent::CreateEvent(event) => self.create_event(event).await,
            Intent::UpdateEvent(update) => self.update_event(update).await,
            Intent::ListEvents(list) => self.list_events(&list.filter).await,
            Intent::CreateVenue(venue) => self.create_venue(index, venue).await,
            Intent::ListVenues => self.list_venues().await,
        };
        let result = outcome.unwrap_or_else(|halt| halt);
        match &result {
            ExecutionResult::Succeeded(effect) => info!(%index, %effect, "Executor::execute: succeeded"),
            ExecutionResult::Failed { cause, .. } => warn!(%index, %cause, "Executor::execute: failed"),
            ExecutionResult::DependencyUnresolved { depends_on } => {
                warn!(%index, %depends_on, "Executor::execute: dependency unresolved")
            }
        }
        result
    }

    /// Run one event system call under the configured timeout
    async fn call<T, F>(&self, op: &str, fut: F) -> Result<T, EventSystemError>
    where
        F: Future<Output = Result<T, EventSystemError>>,
    {
        let limit = self.limits.event_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%op, ?limit, "Executor::call: timed out");
                Err(EventSystemError::Timeout(limit))
            }
        }
    }

    /// Like `call`, but a timeout cannot rule out that the write landed
    async fn write<T, F>(&self, op: &str, fut: F) -> Result<T, EventSystemError>
    where
        F: Future<Output = Result<T, EventSystemError>>,
    {
        self.call(op, fut).await.map_err(|e| match e {
            EventSystemError::Timeout(after) => EventSystemError::Unconfirmed {
                op: op.to_string(),
                after,
            },
            other => other,
        })
    }

    async fn resolve_venue(&self, reference: &VenueRef) -> Result<VenueId, Halt> {
        debug!(%reference, "Executor::resolve_venue: called");
        match reference {
            VenueRef::Intent(source) => self
                .created_venues
                .get(source)
                .copied()
                .ok_or(ExecutionResult::DependencyUnresolved { depends_on: *source }),
            VenueRef::Named(name) => match self.call("find_venue", self.events.find_venue(name)).await {
                Ok(Some(venue)) => Ok(venue.id),
                Ok(None) => Err(ExecutionResult::failed(format!("venue \"{}\" not found", name))),
                Err(e) => Err(ExecutionResult::failed(e.to_string())),
            },
        }
    }

    async fn create_event(&self, event: &CreateEvent) -> Result<ExecutionResult, Halt> {
        debug!(title = %event.title, "Executor::create_event: called");
        let start = required(event.start.as_ref(), "start")?;
        let length = match (&event.end, event.duration_minutes) {
            (Some(end), _) => required(Some(end), "end")? - start,
            (None, Some(minutes)) => Duration::minutes(i64::from(minutes)),
            (None, None) => self.limits.default_duration,
        };
        let venue_id = match &event.venue {
            Some(reference) => Some(self.resolve_venue(reference).await?),
            None => None,
        };

        let starts = match &event.recurrence {
            Some(rule) => rule.occurrences(start, self.limits.max_occurrences as usize),
            None => vec![start],
        };
        debug!(occurrences = %starts.len(), "Executor::create_event: expanded");

        let mut created = Vec::with_capacity(starts.len());
        for occurrence in starts {
            let Some(ends_at) = occurrence.checked_add_signed(length) else {
                return Err(ExecutionResult::partial(
                    format!("event starting {} ends past the end of the calendar", occurrence),
                    created,
                ));
            };
            let new_event = NewEvent {
                title: event.title.clone(),
                description: event.description.clone(),
                starts_at: occurrence.with_timezone(&Utc),
                ends_at: ends_at.with_timezone(&Utc),
                venue_id,
            };
            match self.write("create_event", self.events.create_event(new_event)).await {
                Ok(stored) => created.push(stored),
                Err(e) => return Err(ExecutionResult::partial(e.to_string(), created)),
            }
        }
        Ok(ExecutionResult::Succeeded(Effect::EventsCreated { events: created }))
    }

    async fn update_event(&self, update: &UpdateEvent) -> Result<ExecutionResult, Halt> {
        debug!(filter = %update.filter, "Executor::update_event: called");
        let changes = &update.changes;
        let venue_id = match &changes.venue {
            Some(reference) => Some(self.resolve_venue(reference).await?),
            None => None,
        };
        let candidates = self.matching(&update.filter).await?;
        let new_start = changes.start.as_ref().and_then(DateSpec::resolved);
        let tz = self.limits.timezone;

        let mut updated = Vec::with_capacity(candidates.len());
        for event in candidates {
            let mut patch = EventPatch {
                title: changes.title.clone(),
                description: changes.description.clone(),
                venue_id,
                ..Default::default()
            };

            if new_start.is_some() || changes.start_time.is_some() || changes.duration_minutes.is_some() {
                let length = changes
                    .duration_minutes
                    .map(|m| Duration::minutes(i64::from(m)))
                    .unwrap_or_else(|| event.duration());
                let mut start = new_start.unwrap_or_else(|| event.starts_at.with_timezone(&tz));
                if let Some(time) = changes.start_time {
                    start = start
                        .date_naive()
                        .and_time(time)
                        .and_local_timezone(*start.offset())
                        .single()
                        .unwrap_or(start);
                }
                let Some(ends_at) = start.checked_add_signed(length) else {
                    return Err(ExecutionResult::partial(
                        format!("event {} would end past the end of the calendar", event.id),
                        updated,
                    ));
                };
                patch.starts_at = Some(start.with_timezone(&Utc));
                patch.ends_at = Some(ends_at.with_timezone(&Utc));
            }

            match self.write("update_event", self.events.update_event(event.id, patch)).await {
                Ok(stored) => updated.push(stored),
                Err(e) => return Err(ExecutionResult::partial(e.to_string(), updated)),
            }
        }
        Ok(ExecutionResult::Succeeded(Effect::EventsUpdated { events: updated }))
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<ExecutionResult, Halt> {
        debug!(%filter, "Executor::list_events: called");
        let events = self.matching(filter).await?;
        Ok(ExecutionResult::Succeeded(Effect::EventsListed { events }))
    }

    async fn create_venue(&mut self, index: usize, venue: &CreateVenue) -> Result<ExecutionResult, Halt> {
        debug!(%index, name = %venue.name, "Executor::create_venue: called");
        let new_venue = NewVenue {
            name: venue.name.trim().to_string(),
            address: venue.address.clone(),
            capacity: venue.capacity,
        };
        let stored = self
            .write("create_venue", self.events.create_venue(new_venue))
            .await
            .map_err(|e| ExecutionResult::failed(e.to_string()))?;
        self.created_venues.insert(index, stored.id);
        Ok(ExecutionResult::Succeeded(Effect::VenueCreated { venue: stored }))
    }

    async fn list_venues(&self) -> Result<ExecutionResult, Halt> {
        debug!("Executor::list_venues: called");
        let venues = self
            .call("list_venues", self.events.list_venues())
            .await
            .map_err(|e| ExecutionResult::failed(e.to_string()))?;
        Ok(ExecutionResult::Succeeded(Effect::VenuesListed { venues }))
    }

    /// Events selected by a filter; an unknown venue name matches nothing
    async fn matching(&self, filter: &EventFilter) -> Result<Vec<Event>, Halt> {
        debug!(%filter, "Executor::matching: called");
        let venue_id = match &filter.venue {
            Some(name) => match self.call("find_venue", self.events.find_venue(name)).await {
                Ok(Some(venue)) => Some(venue.id),
                Ok(None) => {
                    debug!(%name, "Executor::matching: no such venue");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(ExecutionResult::failed(e.to_string())),
            },
            None => None,
        };

        let query = EventQuery {
            title_contains: filter.title_contains.clone(),
            venue_id,
            starts_after: filter.starts_after.as_ref().and_then(DateSpec::resolved).map(|t| t.with_timezone(&Utc)),
            starts_before: filter.starts_before.as_ref().and_then(DateSpec::resolved).map(|t| t.with_timezone(&Utc)),
            limit: None,
        };
        let mut events = self
            .call("list_events", self.events.list_events(query))
            .await
            .map_err(|e| ExecutionResult::failed(e.to_string()))?;

        if let Some(time) = filter.at_time {
            let tz = self.limits.timezone;
            events.retain(|e| e.starts_at.with_timezone(&tz).time() == time);
        }
        Ok(events)
    }
}

/// A date the validator has already checked; anything else halts the intent
fn required(spec: Option<&DateSpec>, field: &str) -> Result<DateTime<FixedOffset>, Halt> {
    spec.and_then(DateSpec::resolved)
        .ok_or_else(|| ExecutionResult::failed(format!("{} is not a resolved date", field)))
}

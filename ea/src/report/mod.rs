//! Result reporting
//!
//! Folds per-intent outcomes into the response returned to the caller. The
//! summary is plain text built only from the structured results, so the same
//! outcomes always produce the same summary.

use chrono::FixedOffset;
use serde::Serialize;
use tracing::debug;

use crate::events::{Event, Venue};
use crate::executor::{Effect, ExecutionResult};
use crate::intent::Intent;
use crate::validation::ValidationResult;

/// Everything that happened to one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentOutcome {
    /// Zero-based position in the prompt
    pub index: usize,
    pub intent: Intent,
    pub validation: ValidationResult,
    /// `None` when validation rejected the intent
    pub execution: Option<ExecutionResult>,
}

impl IntentOutcome {
    pub fn succeeded(&self) -> bool {
        self.execution.as_ref().is_some_and(ExecutionResult::is_success)
    }
}

/// Aggregate answer for one prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantResponse {
    /// Correlates the response with log lines
    pub request_id: String,
    /// One entry per parsed intent, in prompt order
    pub entries: Vec<IntentOutcome>,
    pub summary: String,
}

impl AssistantResponse {
    /// True when every intent executed successfully
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(IntentOutcome::succeeded)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    succeeded: usize,
    rejected: usize,
    failed: usize,
    skipped: usize,
}

/// Builds responses, showing times in one offset
#[derive(Debug, Clone)]
pub struct Reporter {
    timezone: FixedOffset,
}

impl Reporter {
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }

    pub fn report(&self, request_id: impl Into<String>, entries: Vec<IntentOutcome>) -> AssistantResponse {
        debug!(entries = %entries.len(), "Reporter::report: called");
        let summary = self.summarize(&entries);
        AssistantResponse {
            request_id: request_id.into(),
            entries,
            summary,
        }
    }

    /// Human-readable text for a set of outcomes
    pub fn summarize(&self, entries: &[IntentOutcome]) -> String {
        if entries.is_empty() {
            return "Nothing to do: the request did not ask for any event or venue operation.".to_string();
        }

        let mut lines = Vec::new();
        let mut tally = Tally::default();
        for entry in entries {
            let head = format!("{}. {}", entry.index + 1, entry.intent.label());
            match (&entry.validation, &entry.execution) {
                (ValidationResult::Rejected(rejection), _) => {
                    tally.rejected += 1;
                    lines.push(format!("{}: rejected, {}", head, rejection));
                }
                (ValidationResult::Accepted, None) => {
                    tally.skipped += 1;
                    lines.push(format!("{}: not run", head));
                }
                (ValidationResult::Accepted, Some(ExecutionResult::Succeeded(effect))) => {
                    tally.succeeded += 1;
                    lines.push(format!("{}: {}", head, self.describe(effect)));
                    lines.extend(self.details(effect).into_iter().map(|d| format!("   - {}", d)));
                }
                (ValidationResult::Accepted, Some(ExecutionResult::Failed { cause, partial })) => {
                    tally.failed += 1;
                    lines.push(format!("{}: failed, {}", head, cause));
                    if !partial.is_empty() {
                        lines.push(format!(
                            "   {} event(s) were written before the failure:",
                            partial.len()
                        ));
                        lines.extend(partial.iter().map(|e| format!("   - {}", self.event_line(e))));
                    }
                }
                (ValidationResult::Accepted, Some(ExecutionResult::DependencyUnresolved { depends_on })) => {
                    tally.skipped += 1;
                    lines.push(format!(
                        "{}: skipped, operation {} did not create the venue it needs",
                        head,
                        depends_on + 1
                    ));
                }
            }
        }
        lines.push(tally_line(&tally));
        lines.join("\n")
    }

    fn describe(&self, effect: &Effect) -> String {
        match effect {
            Effect::EventsCreated { events } if events.len() == 1 => {
                format!("created for {}", self.when(&events[0]))
            }
            Effect::EventsCreated { events } => format!("created {} events", events.len()),
            Effect::EventsUpdated { events } if events.is_empty() => "no matching events".to_string(),
            Effect::EventsUpdated { events } => format!("updated {} event(s)", events.len()),
            Effect::EventsListed { events } if events.is_empty() => "no matching events".to_string(),
            Effect::EventsListed { events } => format!("{} event(s)", events.len()),
            Effect::VenueCreated { venue } => format!("created (id {})", venue.id),
            Effect::VenuesListed { venues } if venues.is_empty() => "no venues".to_string(),
            Effect::VenuesListed { venues } => format!("{} venue(s)", venues.len()),
        }
    }

    /// Indented detail lines under an entry
    fn details(&self, effect: &Effect) -> Vec<String> {
        match effect {
            Effect::EventsCreated { events } if events.len() > 1 => self.event_lines(events),
            Effect::EventsCreated { .. } | Effect::VenueCreated { .. } => Vec::new(),
            Effect::EventsUpdated { events } | Effect::EventsListed { events } => self.event_lines(events),
            Effect::VenuesListed { venues } => venues.iter().map(venue_line).collect(),
        }
    }

    fn event_lines(&self, events: &[Event]) -> Vec<String> {
        events.iter().map(|e| self.event_line(e)).collect()
    }

    fn event_line(&self, event: &Event) -> String {
        let mut line = format!("{} {}", self.when(event), event.title);
        if let Some(venue_id) = event.venue_id {
            line.push_str(&format!(" (venue {})", venue_id));
        }
        line
    }

    /// "Tue 2026-10-20 19:00-21:00", or the full end date for multi-day events
    fn when(&self, event: &Event) -> String {
        let start = event.starts_at.with_timezone(&self.timezone);
        let end = event.ends_at.with_timezone(&self.timezone);
        if start.date_naive() == end.date_naive() {
            format!("{}-{}", start.format("%a %Y-%m-%d %H:%M"), end.format("%H:%M"))
        } else {
            format!("{} to {}", start.format("%a %Y-%m-%d %H:%M"), end.format("%a %Y-%m-%d %H:%M"))
        }
    }
}

fn venue_line(venue: &Venue) -> String {
    let mut line = format!("{} (id {})", venue.name, venue.id);
    if let Some(address) = &venue.address {
        line.push_str(&format!(", {}", address));
    }
    if let Some(capacity) = venue.capacity {
        line.push_str(&format!(", capacity {}", capacity));
    }
    line
}

fn tally_line(tally: &Tally) -> String {
    let mut parts = vec![format!("{} succeeded", tally.succeeded)];
    if tally.rejected > 0 {
        parts.push(format!("{} rejected", tally.rejected));
    }
    if tally.failed > 0 {
        parts.push(format!("{} failed", tally.failed));
    }
    if tally.skipped > 0 {
        parts.push(format!("{} skipped", tally.skipped));
    }
    format!("Done: {}.", parts.join(", "))
}

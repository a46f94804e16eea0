//! JSON shape the completion service is instructed to reply with
//!
//! Every field is optional at this layer so that a missing title or start is
//! reported against the one operation instead of failing the whole reply.
//! Unknown fields and unknown kinds are schema violations.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::dates;
use crate::intent::{
    CreateEvent, CreateVenue, DateSpec, EventChanges, EventFilter, Frequency, Intent, ListEvents, RecurrenceRule,
    Selector, UpdateEvent, VenueRef,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireReply {
    pub intents: Vec<WireIntent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireIntent {
    CreateEvent(WireCreateEvent),
    UpdateEvent(WireUpdateEvent),
    ListEvents(WireListEvents),
    CreateVenue(WireCreateVenue),
    ListVenues(WireListVenues),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireCreateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration_minutes: Option<u32>,
    pub venue: Option<WireVenueRef>,
    pub recurrence: Option<WireRecurrence>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireUpdateEvent {
    pub filter: Option<WireFilter>,
    pub changes: Option<WireChanges>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireListEvents {
    pub filter: Option<WireFilter>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireCreateVenue {
    pub name: Option<String>,
    pub address: Option<String>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireListVenues {}

/// `{"intent": 0}`, `{"name": "Hall"}` or just `"Hall"`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireVenueRef {
    Intent { intent: usize },
    Named { name: String },
    Plain(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireRecurrence {
    pub frequency: WireFrequency,
    pub interval: Option<u32>,
    pub weekday: Option<String>,
    pub ordinal: Option<i8>,
    pub day_of_month: Option<u32>,
    pub count: Option<u32>,
    pub until: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireFilter {
    pub title_contains: Option<String>,
    pub venue: Option<String>,
    pub starts_after: Option<String>,
    pub starts_before: Option<String>,
    pub at_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<u32>,
    pub venue: Option<WireVenueRef>,
}

/// Blank strings count as absent
fn text(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl WireIntent {
    /// Convert into a domain intent; `Err` describes a shape problem
    pub fn into_intent(self, now: DateTime<FixedOffset>) -> Result<Intent, String> {
        let intent = match self {
            WireIntent::CreateEvent(w) => Intent::CreateEvent(CreateEvent {
                title: text(w.title).unwrap_or_default(),
                description: text(w.description),
                start: text(w.start).map(|s| dates::resolve(&s, now)),
                end: text(w.end).map(|s| dates::resolve_end(&s, now)),
                duration_minutes: w.duration_minutes,
                venue: w.venue.map(WireVenueRef::into_ref).transpose()?,
                recurrence: w.recurrence.map(|r| r.into_rule(now)).transpose()?,
            }),
            WireIntent::UpdateEvent(w) => Intent::UpdateEvent(UpdateEvent {
                filter: w.filter.unwrap_or_default().into_filter(now)?,
                changes: w.changes.unwrap_or_default().into_changes(now)?,
            }),
            WireIntent::ListEvents(w) => Intent::ListEvents(ListEvents {
                filter: w.filter.unwrap_or_default().into_filter(now)?,
            }),
            WireIntent::CreateVenue(w) => Intent::CreateVenue(CreateVenue {
                name: text(w.name).unwrap_or_default(),
                address: text(w.address),
                capacity: w.capacity,
            }),
            WireIntent::ListVenues(_) => Intent::ListVenues,
        };
        Ok(intent)
    }
}

impl WireVenueRef {
    fn into_ref(self) -> Result<VenueRef, String> {
        match self {
            WireVenueRef::Intent { intent } => Ok(VenueRef::Intent(intent)),
            WireVenueRef::Named { name } | WireVenueRef::Plain(name) => text(Some(name))
                .map(VenueRef::Named)
                .ok_or_else(|| "venue name is blank".to_string()),
        }
    }
}

impl WireRecurrence {
    fn into_rule(self, now: DateTime<FixedOffset>) -> Result<RecurrenceRule, String> {
        let frequency = match self.frequency {
            WireFrequency::Daily => Frequency::Daily,
            WireFrequency::Weekly => Frequency::Weekly,
            WireFrequency::Monthly => Frequency::Monthly,
        };
        let weekday = match text(self.weekday) {
            Some(w) => Some(dates::parse_weekday(&w).ok_or_else(|| format!("unknown weekday \"{}\"", w))?),
            None => None,
        };
        let selector = match (weekday, self.ordinal, self.day_of_month) {
            (None, None, None) => None,
            (Some(weekday), None, None) => Some(Selector::Weekday(weekday)),
            (Some(weekday), Some(ordinal), None) => Some(Selector::OrdinalWeekday { ordinal, weekday }),
            (None, None, Some(day)) => Some(Selector::DayOfMonth(day)),
            (None, Some(_), _) => return Err("recurrence ordinal needs a weekday".to_string()),
            (Some(_), _, Some(_)) => return Err("recurrence sets both weekday and day_of_month".to_string()),
        };
        Ok(RecurrenceRule {
            frequency,
            interval: self.interval.unwrap_or(1),
            selector,
            count: self.count,
            until: text(self.until).map(|s| dates::resolve(&s, now)),
        })
    }
}

impl WireFilter {
    fn into_filter(self, now: DateTime<FixedOffset>) -> Result<EventFilter, String> {
        Ok(EventFilter {
            title_contains: text(self.title_contains),
            venue: text(self.venue),
            starts_after: text(self.starts_after).map(|s| dates::resolve(&s, now)),
            starts_before: text(self.starts_before).map(|s| dates::resolve(&s, now)),
            at_time: time_field("filter.at_time", self.at_time)?,
        })
    }
}

impl WireChanges {
    fn into_changes(self, now: DateTime<FixedOffset>) -> Result<EventChanges, String> {
        Ok(EventChanges {
            title: text(self.title),
            description: text(self.description),
            start: text(self.start).map(|s| dates::resolve(&s, now)),
            start_time: time_field("changes.start_time", self.start_time)?,
            duration_minutes: self.duration_minutes,
            venue: self.venue.map(WireVenueRef::into_ref).transpose()?,
        })
    }
}

fn time_field(field: &str, value: Option<String>) -> Result<Option<chrono::NaiveTime>, String> {
    match text(value) {
        Some(t) => dates::parse_time_of_day(&t)
            .map(Some)
            .ok_or_else(|| format!("{} \"{}\" is not a time of day", field, t)),
        None => Ok(None),
    }
}

/// Write intents back in the reply shape, so an earlier turn can be replayed
/// to the completion service as its own answer
pub fn render_reply<'a>(intents: impl IntoIterator<Item = &'a Intent>) -> String {
    let intents: Vec<Value> = intents.into_iter().map(render_intent).collect();
    json!({ "intents": intents }).to_string()
}

fn render_intent(intent: &Intent) -> Value {
    let mut out = Map::new();
    put(&mut out, "kind", Some(intent.kind()));
    match intent {
        Intent::CreateEvent(e) => {
            put(&mut out, "title", Some(e.title.as_str()).filter(|t| !t.is_empty()));
            put(&mut out, "description", e.description.as_deref());
            put(&mut out, "start", e.start.as_ref().map(date_text));
            put(&mut out, "end", e.end.as_ref().map(date_text));
            put(&mut out, "duration_minutes", e.duration_minutes);
            put(&mut out, "venue", e.venue.as_ref().map(venue_value));
            put(&mut out, "recurrence", e.recurrence.as_ref().map(recurrence_value));
        }
        Intent::UpdateEvent(u) => {
            out.insert("filter".to_string(), filter_value(&u.filter));
            let c = &u.changes;
            let mut changes = Map::new();
            put(&mut changes, "title", c.title.as_deref());
            put(&mut changes, "description", c.description.as_deref());
            put(&mut changes, "start", c.start.as_ref().map(date_text));
            put(&mut changes, "start_time", c.start_time.map(|t| t.format("%H:%M").to_string()));
            put(&mut changes, "duration_minutes", c.duration_minutes);
            put(&mut changes, "venue", c.venue.as_ref().map(venue_value));
            out.insert("changes".to_string(), Value::Object(changes));
        }
        Intent::ListEvents(l) => {
            out.insert("filter".to_string(), filter_value(&l.filter));
        }
        Intent::CreateVenue(v) => {
            put(&mut out, "name", Some(v.name.as_str()).filter(|n| !n.is_empty()));
            put(&mut out, "address", v.address.as_deref());
            put(&mut out, "capacity", v.capacity);
        }
        Intent::ListVenues => {}
    }
    Value::Object(out)
}

fn put<T: Serialize>(out: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value
        && let Ok(value) = serde_json::to_value(value)
    {
        out.insert(key.to_string(), value);
    }
}

fn date_text(spec: &DateSpec) -> String {
    match spec {
        DateSpec::At(t) => t.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        DateSpec::Unresolved(text) => text.clone(),
    }
}

fn venue_value(reference: &VenueRef) -> Value {
    match reference {
        VenueRef::Intent(intent) => json!({ "intent": intent }),
        VenueRef::Named(name) => json!({ "name": name }),
    }
}

fn recurrence_value(rule: &RecurrenceRule) -> Value {
    let mut out = Map::new();
    put(&mut out, "frequency", Some(rule.frequency));
    put(&mut out, "interval", Some(rule.interval).filter(|i| *i != 1));
    match rule.selector {
        Some(Selector::Weekday(weekday)) => put(&mut out, "weekday", Some(weekday.to_string())),
        Some(Selector::OrdinalWeekday { ordinal, weekday }) => {
            put(&mut out, "weekday", Some(weekday.to_string()));
            put(&mut out, "ordinal", Some(ordinal));
        }
        Some(Selector::DayOfMonth(day)) => put(&mut out, "day_of_month", Some(day)),
        None => {}
    }
    put(&mut out, "count", rule.count);
    put(&mut out, "until", rule.until.as_ref().map(date_text));
    Value::Object(out)
}

fn filter_value(filter: &EventFilter) -> Value {
    let mut out = Map::new();
    put(&mut out, "title_contains", filter.title_contains.as_deref());
    put(&mut out, "venue", filter.venue.as_deref());
    put(&mut out, "starts_after", filter.starts_after.as_ref().map(date_text));
    put(&mut out, "starts_before", filter.starts_before.as_ref().map(date_text));
    put(&mut out, "at_time", filter.at_time.map(|t| t.format("%H:%M").to_string()));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::DateSpec;
    use chrono::{NaiveTime, TimeZone, Weekday};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 18, 9, 0, 0)
            .unwrap()
    }

    fn parse(json: &str) -> Result<Vec<Intent>, String> {
        let reply: WireReply = serde_json::from_str(json).map_err(|e| e.to_string())?;
        reply.intents.into_iter().map(|w| w.into_intent(now())).collect()
    }

    #[test]
    fn test_recurring_create_event() {
        let intents = parse(
            r#"{"intents":[{"kind":"create_event","title":"Book Club","start":"2026-10-20T19:00",
                "recurrence":{"frequency":"monthly","weekday":"tuesday","ordinal":3,"count":6}}]}"#,
        )
        .unwrap();
        let Intent::CreateEvent(event) = &intents[0] else {
            panic!("expected create_event");
        };
        assert_eq!(event.title, "Book Club");
        let rule = event.recurrence.as_ref().unwrap();
        assert_eq!(rule.frequency, Frequency::Monthly);
        assert_eq!(
            rule.selector,
            Some(Selector::OrdinalWeekday {
                ordinal: 3,
                weekday: Weekday::Tue
            })
        );
        assert_eq!(rule.count, Some(6));
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let intents = parse(r#"{"intents":[{"kind":"create_event","title":"  "},{"kind":"update_event"}]}"#).unwrap();
        let Intent::CreateEvent(event) = &intents[0] else {
            panic!("expected create_event");
        };
        assert!(event.title.is_empty());
        assert!(event.start.is_none());
        let Intent::UpdateEvent(update) = &intents[1] else {
            panic!("expected update_event");
        };
        assert!(update.filter.is_empty());
        assert!(update.changes.is_empty());
    }

    #[test]
    fn test_update_with_times() {
        let intents = parse(
            r#"{"intents":[{"kind":"update_event","filter":{"title_contains":"Book Club","at_time":"19:00"},
                "changes":{"start_time":"8pm"}}]}"#,
        )
        .unwrap();
        let Intent::UpdateEvent(update) = &intents[0] else {
            panic!("expected update_event");
        };
        assert_eq!(update.filter.at_time, NaiveTime::from_hms_opt(19, 0, 0));
        assert_eq!(update.changes.start_time, NaiveTime::from_hms_opt(20, 0, 0));
    }

    #[test]
    fn test_venue_ref_shapes() {
        let intents = parse(
            r#"{"intents":[
                {"kind":"create_venue","name":"Hall"},
                {"kind":"create_event","title":"A","start":"2026-11-01","venue":{"intent":0}},
                {"kind":"create_event","title":"B","start":"2026-11-01","venue":{"name":"Annex"}},
                {"kind":"create_event","title":"C","start":"2026-11-01","venue":"Loft"}]}"#,
        )
        .unwrap();
        let venues: Vec<_> = intents.iter().flat_map(|i| i.venue_refs()).cloned().collect();
        assert_eq!(
            venues,
            vec![
                VenueRef::Intent(0),
                VenueRef::Named("Annex".to_string()),
                VenueRef::Named("Loft".to_string())
            ]
        );
    }

    #[test]
    fn test_rendered_reply_reads_back_the_same() {
        let intents = parse(
            r#"{"intents":[
                {"kind":"create_venue","name":"Hall","capacity":80},
                {"kind":"create_event","title":"Book Club","start":"2026-10-20T19:00","end":"2026-10-20",
                    "venue":{"intent":0},
                    "recurrence":{"frequency":"monthly","weekday":"tue","ordinal":3,"count":6,"until":"2027-06-01"}},
                {"kind":"update_event","filter":{"title_contains":"Book Club","at_time":"19:00"},
                    "changes":{"start_time":"8pm","venue":"Loft"}},
                {"kind":"list_events","filter":{"starts_after":"sometime"}},
                {"kind":"list_venues"}]}"#,
        )
        .unwrap();

        let rendered = render_reply(&intents);
        assert_eq!(parse(&rendered).unwrap(), intents);
    }

    #[test]
    fn test_unresolved_date_is_kept() {
        let intents = parse(r#"{"intents":[{"kind":"create_event","title":"A","start":"whenever"}]}"#).unwrap();
        let Intent::CreateEvent(event) = &intents[0] else {
            panic!("expected create_event");
        };
        assert_eq!(event.start, Some(DateSpec::Unresolved("whenever".to_string())));
    }

    #[test]
    fn test_shape_violations() {
        assert!(parse(r#"{"intents":[{"kind":"delete_event"}]}"#).is_err());
        assert!(parse(r#"{"intents":[{"kind":"list_venues","extra":1}]}"#).is_err());
        assert!(parse(r#"{"intents":[{"kind":"create_venue","name":"Hall","color":"red"}]}"#).is_err());
        assert!(parse(r#"{"intents":[{"title":"no kind"}]}"#).is_err());
        assert!(parse(r#"{"operations":[]}"#).is_err());
        assert!(parse(r#"{"intents":[{"kind":"list_events","filter":{"at_time":"evening"}}]}"#).is_err());
        assert!(
            parse(r#"{"intents":[{"kind":"create_event","title":"A","recurrence":{"frequency":"weekly","weekday":"blursday"}}]}"#)
                .is_err()
        );
    }
}

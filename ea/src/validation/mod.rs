//! Intent validation
//!
//! Shape checks only: every rule here looks at the intent and its position in
//! the prompt, never at the event system. Existence of events and venues is
//! the executor's concern.

mod rejection;

pub use rejection::{Rejection, ValidationResult};

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use tracing::debug;

use crate::config::Limits;
use crate::intent::{CreateEvent, DateSpec, EventFilter, Intent, RecurrenceRule, UpdateEvent, VenueRef};

/// Upper bound on how far an `until`-only series is expanded to count it
const COUNTING_CAP: usize = 10_000;

/// Longest single event, in minutes
pub const MAX_EVENT_MINUTES: u32 = 366 * 24 * 60;

/// Years an event may start or end in, in UTC
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Where an intent sits in its prompt
#[derive(Debug, Clone, Copy)]
pub struct SequenceContext<'a> {
    /// Zero-based position of the intent being validated
    pub index: usize,
    /// Every intent the prompt produced, in order
    pub intents: &'a [Intent],
}

impl<'a> SequenceContext<'a> {
    pub fn new(index: usize, intents: &'a [Intent]) -> Self {
        Self { index, intents }
    }

    /// True if `target` is an earlier intent that creates a venue
    fn is_earlier_venue(&self, target: usize) -> bool {
        target < self.index && matches!(self.intents.get(target), Some(Intent::CreateVenue(_)))
    }
}

/// Per-intent rule checks
#[derive(Debug, Clone)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate one intent
    pub fn validate(&self, intent: &Intent, ctx: &SequenceContext<'_>) -> ValidationResult {
        debug!(index = %ctx.index, kind = %intent.kind(), "Validator::validate: called");
        match self.check(intent, ctx) {
            Ok(()) => ValidationResult::Accepted,
            Err(rejection) => {
                debug!(index = %ctx.index, %rejection, "Validator::validate: rejected");
                ValidationResult::Rejected(rejection)
            }
        }
    }

    fn check(&self, intent: &Intent, ctx: &SequenceContext<'_>) -> Result<(), Rejection> {
        match intent {
            Intent::CreateEvent(event) => self.check_create_event(event)?,
            Intent::UpdateEvent(update) => check_update_event(update)?,
            Intent::ListEvents(list) => check_filter(&list.filter)?,
            Intent::CreateVenue(venue) => {
                if venue.name.trim().is_empty() {
                    return Err(Rejection::missing("name"));
                }
            }
            Intent::ListVenues => {}
        }

        for reference in intent.venue_refs() {
            match reference {
                VenueRef::Intent(target) if !ctx.is_earlier_venue(*target) => {
                    return Err(Rejection::UnresolvableVenue {
                        reference: reference.to_string(),
                    });
                }
                VenueRef::Named(name) if name.trim().is_empty() => return Err(Rejection::missing("venue")),
                _ => {}
            }
        }
        Ok(())
    }

    fn check_create_event(&self, event: &CreateEvent) -> Result<(), Rejection> {
        if event.title.trim().is_empty() {
            return Err(Rejection::missing("title"));
        }
        let start = match &event.start {
            None => return Err(Rejection::missing("start")),
            Some(spec) => resolved("start", spec)?,
        };
        check_year("start", start)?;
        let length = match (&event.end, event.duration_minutes) {
            (Some(end), _) => {
                let end = resolved("end", end)?;
                if end < start {
                    return Err(Rejection::InvalidTimeRange {
                        detail: "end is before start".to_string(),
                    });
                }
                check_year("end", end)?;
                end - start
            }
            (None, Some(minutes)) => minutes_length(minutes)?,
            (None, None) => self.limits.default_duration,
        };
        if length > Duration::minutes(i64::from(MAX_EVENT_MINUTES)) {
            return Err(Rejection::InvalidTimeRange {
                detail: format!("an event may last at most {} days", MAX_EVENT_MINUTES / (24 * 60)),
            });
        }

        let last_start = match &event.recurrence {
            Some(rule) => self.check_recurrence(rule, start)?,
            None => start,
        };
        match last_start.checked_add_signed(length) {
            Some(last_end) => check_year("end", last_end),
            None => Err(out_of_range("end")),
        }
    }

    /// Check a series and return the start of its last occurrence
    fn check_recurrence(
        &self,
        rule: &RecurrenceRule,
        start: DateTime<FixedOffset>,
    ) -> Result<DateTime<FixedOffset>, Rejection> {
        let max = self.limits.max_occurrences;
        if let Some(detail) = rule.shape_error() {
            return Err(Rejection::InvalidRecurrence { detail });
        }
        let until = match &rule.until {
            Some(spec) => Some(resolved("recurrence.until", spec)?),
            None => None,
        };

        match (rule.count, until) {
            (None, None) => Err(Rejection::missing("recurrence.count")),
            (Some(0), _) => Err(Rejection::InvalidRecurrence {
                detail: "count must be at least 1".to_string(),
            }),
            (Some(count), _) if count > max => Err(Rejection::ExceedsRecurrenceLimit { requested: count, max }),
            (Some(count), _) => Ok(rule.occurrences(start, count as usize).last().copied().unwrap_or(start)),
            (None, Some(until)) => {
                if until.date_naive() < start.date_naive() {
                    return Err(Rejection::InvalidRecurrence {
                        detail: "until is before the first occurrence".to_string(),
                    });
                }
                let starts = rule.occurrences(start, COUNTING_CAP);
                if starts.len() > max as usize {
                    return Err(Rejection::ExceedsRecurrenceLimit {
                        requested: u32::try_from(starts.len()).unwrap_or(u32::MAX),
                        max,
                    });
                }
                Ok(starts.last().copied().unwrap_or(start))
            }
        }
    }
}

fn check_update_event(update: &UpdateEvent) -> Result<(), Rejection> {
    if update.filter.is_empty() {
        return Err(Rejection::missing("filter"));
    }
    check_filter(&update.filter)?;
    if update.changes.is_empty() {
        return Err(Rejection::EmptyChangeSet);
    }
    if let Some(start) = &update.changes.start {
        let start = resolved("changes.start", start)?;
        check_year("changes.start", start)?;
    }
    if let Some(minutes) = update.changes.duration_minutes {
        minutes_length(minutes)?;
    }
    if update.changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Rejection::missing("changes.title"));
    }
    Ok(())
}

fn check_filter(filter: &EventFilter) -> Result<(), Rejection> {
    for (field, spec) in filter.dates() {
        resolved(field, spec)?;
    }
    if let (Some(DateSpec::At(after)), Some(DateSpec::At(before))) = (&filter.starts_after, &filter.starts_before)
        && after >= before
    {
        return Err(Rejection::InvalidTimeRange {
            detail: "filter.starts_after is not before filter.starts_before".to_string(),
        });
    }
    Ok(())
}

fn minutes_length(minutes: u32) -> Result<Duration, Rejection> {
    if minutes > MAX_EVENT_MINUTES {
        return Err(Rejection::InvalidTimeRange {
            detail: format!("duration of {} minutes is longer than {} days", minutes, MAX_EVENT_MINUTES / (24 * 60)),
        });
    }
    Ok(Duration::minutes(i64::from(minutes)))
}

fn check_year(field: &str, t: DateTime<FixedOffset>) -> Result<(), Rejection> {
    if YEARS.contains(&t.with_timezone(&Utc).year()) {
        Ok(())
    } else {
        Err(out_of_range(field))
    }
}

fn out_of_range(field: &str) -> Rejection {
    Rejection::InvalidTimeRange {
        detail: format!("{} falls outside years {}-{}", field, YEARS.start(), YEARS.end()),
    }
}

fn resolved(field: &str, spec: &DateSpec) -> Result<DateTime<FixedOffset>, Rejection> {
    match spec {
        DateSpec::At(t) => Ok(*t),
        DateSpec::Unresolved(text) => Err(Rejection::AmbiguousDate {
            field: field.to_string(),
            text: text.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{CreateVenue, EventChanges, Frequency, ListEvents, Selector};
    use chrono::{NaiveTime, TimeZone, Weekday};
    use proptest::prelude::*;

    fn at(d: u32, h: u32) -> DateSpec {
        DateSpec::At(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2026, 11, d, h, 0, 0)
                .unwrap(),
        )
    }

    fn validator(max_occurrences: u32) -> Validator {
        Validator::new(Limits {
            max_occurrences,
            ..Limits::default()
        })
    }

    fn event(title: &str) -> CreateEvent {
        CreateEvent {
            title: title.to_string(),
            start: Some(at(3, 19)),
            ..Default::default()
        }
    }

    fn alone(v: &Validator, intent: Intent) -> ValidationResult {
        let intents = [intent];
        v.validate(&intents[0], &SequenceContext::new(0, &intents))
    }

    fn rejection(result: ValidationResult) -> Rejection {
        match result {
            ValidationResult::Rejected(r) => r,
            ValidationResult::Accepted => panic!("expected a rejection"),
        }
    }

    #[test]
    fn test_minimal_event_accepted() {
        assert!(alone(&validator(52), Intent::CreateEvent(event("Gala"))).is_accepted());
    }

    #[test]
    fn test_missing_title_and_start() {
        let r = rejection(alone(&validator(52), Intent::CreateEvent(event(" "))));
        assert_eq!(r, Rejection::missing("title"));

        let no_start = CreateEvent {
            start: None,
            ..event("Gala")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(no_start)));
        assert_eq!(r, Rejection::missing("start"));
    }

    #[test]
    fn test_ambiguous_start_quotes_text() {
        let vague = CreateEvent {
            start: Some(DateSpec::Unresolved("sometime next month".to_string())),
            ..event("Gala")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(vague)));
        assert_eq!(
            r,
            Rejection::AmbiguousDate {
                field: "start".to_string(),
                text: "sometime next month".to_string()
            }
        );
    }

    #[test]
    fn test_end_before_start() {
        let backwards = CreateEvent {
            end: Some(at(3, 18)),
            ..event("Gala")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(backwards)));
        assert!(matches!(r, Rejection::InvalidTimeRange { .. }));

        let multi_day = CreateEvent {
            end: Some(at(5, 17)),
            ..event("Conference")
        };
        assert!(alone(&validator(52), Intent::CreateEvent(multi_day)).is_accepted());
    }

    #[test]
    fn test_huge_duration_rejected() {
        let forever = CreateEvent {
            duration_minutes: Some(u32::MAX),
            ..event("Gala")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(forever)));
        assert!(matches!(r, Rejection::InvalidTimeRange { .. }));

        let year_long = CreateEvent {
            duration_minutes: Some(MAX_EVENT_MINUTES),
            ..event("Exhibition")
        };
        assert!(alone(&validator(52), Intent::CreateEvent(year_long)).is_accepted());
    }

    #[test]
    fn test_end_beyond_year_9999_rejected() {
        let far = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(10192, 1, 1, 0, 0, 0).unwrap();
        let r = rejection(alone(
            &validator(52),
            Intent::CreateEvent(CreateEvent {
                end: Some(DateSpec::At(far)),
                ..event("Gala")
            }),
        ));
        assert!(matches!(r, Rejection::InvalidTimeRange { ref detail } if detail.contains("9999")));

        let late = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(9999, 12, 1, 9, 0, 0).unwrap();
        let r = rejection(alone(
            &validator(52),
            Intent::CreateEvent(CreateEvent {
                start: Some(DateSpec::At(late)),
                recurrence: Some(RecurrenceRule {
                    count: Some(3),
                    ..RecurrenceRule::new(Frequency::Monthly)
                }),
                ..event("Series")
            }),
        ));
        assert!(matches!(r, Rejection::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_update_with_huge_duration_rejected() {
        let update = UpdateEvent {
            filter: EventFilter {
                title_contains: Some("Club".to_string()),
                ..Default::default()
            },
            changes: EventChanges {
                duration_minutes: Some(u32::MAX),
                ..Default::default()
            },
        };
        let r = rejection(alone(&validator(52), Intent::UpdateEvent(update)));
        assert!(matches!(r, Rejection::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_recurrence_needs_bound() {
        let open_ended = CreateEvent {
            recurrence: Some(RecurrenceRule::new(Frequency::Weekly)),
            ..event("Standup")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(open_ended)));
        assert_eq!(r, Rejection::missing("recurrence.count"));
    }

    #[test]
    fn test_recurrence_count_zero() {
        let zero = CreateEvent {
            recurrence: Some(RecurrenceRule {
                count: Some(0),
                ..RecurrenceRule::new(Frequency::Daily)
            }),
            ..event("Standup")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(zero)));
        assert!(matches!(r, Rejection::InvalidRecurrence { .. }));
    }

    #[test]
    fn test_until_expansion_over_limit() {
        let daily = CreateEvent {
            recurrence: Some(RecurrenceRule {
                until: Some(at(30, 0)),
                ..RecurrenceRule::new(Frequency::Daily)
            }),
            ..event("Standup")
        };
        let r = rejection(alone(&validator(10), Intent::CreateEvent(daily.clone())));
        assert_eq!(r, Rejection::ExceedsRecurrenceLimit { requested: 28, max: 10 });
        assert!(alone(&validator(52), Intent::CreateEvent(daily)).is_accepted());
    }

    #[test]
    fn test_bad_ordinal() {
        let bad = CreateEvent {
            recurrence: Some(RecurrenceRule {
                selector: Some(Selector::OrdinalWeekday {
                    ordinal: 7,
                    weekday: Weekday::Tue,
                }),
                count: Some(3),
                ..RecurrenceRule::new(Frequency::Monthly)
            }),
            ..event("Club")
        };
        let r = rejection(alone(&validator(52), Intent::CreateEvent(bad)));
        assert!(matches!(r, Rejection::InvalidRecurrence { .. }));
    }

    #[test]
    fn test_update_needs_filter_and_changes() {
        let v = validator(52);
        let no_filter = UpdateEvent {
            changes: EventChanges {
                title: Some("New".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            rejection(alone(&v, Intent::UpdateEvent(no_filter))),
            Rejection::missing("filter")
        );

        let no_changes = UpdateEvent {
            filter: EventFilter {
                title_contains: Some("Club".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            rejection(alone(&v, Intent::UpdateEvent(no_changes))),
            Rejection::EmptyChangeSet
        );

        let good = UpdateEvent {
            filter: EventFilter {
                title_contains: Some("Club".to_string()),
                at_time: NaiveTime::from_hms_opt(19, 0, 0),
                ..Default::default()
            },
            changes: EventChanges {
                start_time: NaiveTime::from_hms_opt(20, 0, 0),
                ..Default::default()
            },
        };
        assert!(alone(&v, Intent::UpdateEvent(good)).is_accepted());
    }

    #[test]
    fn test_list_filter_dates() {
        let v = validator(52);
        assert!(alone(&v, Intent::ListEvents(ListEvents::default())).is_accepted());

        let vague = ListEvents {
            filter: EventFilter {
                starts_after: Some(DateSpec::Unresolved("soonish".to_string())),
                ..Default::default()
            },
        };
        assert!(matches!(
            rejection(alone(&v, Intent::ListEvents(vague))),
            Rejection::AmbiguousDate { .. }
        ));

        let inverted = ListEvents {
            filter: EventFilter {
                starts_after: Some(at(10, 0)),
                starts_before: Some(at(5, 0)),
                ..Default::default()
            },
        };
        assert!(matches!(
            rejection(alone(&v, Intent::ListEvents(inverted))),
            Rejection::InvalidTimeRange { .. }
        ));
    }

    #[test]
    fn test_venue_reference_must_point_back_at_create_venue() {
        let v = validator(52);
        let intents = vec![
            Intent::CreateVenue(CreateVenue {
                name: "Hall".to_string(),
                ..Default::default()
            }),
            Intent::ListVenues,
            Intent::CreateEvent(CreateEvent {
                venue: Some(VenueRef::Intent(0)),
                ..event("Gala")
            }),
            Intent::CreateEvent(CreateEvent {
                venue: Some(VenueRef::Intent(1)),
                ..event("Gala")
            }),
            Intent::CreateEvent(CreateEvent {
                venue: Some(VenueRef::Intent(5)),
                ..event("Gala")
            }),
        ];
        let results: Vec<_> = (0..intents.len())
            .map(|i| v.validate(&intents[i], &SequenceContext::new(i, &intents)).is_accepted())
            .collect();
        assert_eq!(results, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_blank_venue_name() {
        let r = rejection(alone(&validator(52), Intent::CreateVenue(CreateVenue::default())));
        assert_eq!(r, Rejection::missing("name"));
    }

    proptest! {
        #[test]
        fn prop_count_over_limit_always_rejected(max in 1u32..200, excess in 1u32..10_000) {
            let count = max + excess;
            let series = CreateEvent {
                recurrence: Some(RecurrenceRule {
                    count: Some(count),
                    ..RecurrenceRule::new(Frequency::Weekly)
                }),
                ..event("Series")
            };
            let r = rejection(alone(&validator(max), Intent::CreateEvent(series)));
            prop_assert_eq!(r, Rejection::ExceedsRecurrenceLimit { requested: count, max });
        }

        #[test]
        fn prop_count_within_limit_accepted(max in 1u32..200, pick in 0u32..200) {
            let count = pick % max + 1;
            let series = CreateEvent {
                recurrence: Some(RecurrenceRule {
                    count: Some(count),
                    ..RecurrenceRule::new(Frequency::Daily)
                }),
                ..event("Series")
            };
            prop_assert!(alone(&validator(max), Intent::CreateEvent(series)).is_accepted());
        }
    }
}

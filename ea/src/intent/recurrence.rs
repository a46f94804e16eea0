//! Recurrence rules and their expansion into concrete start times

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, Weekday};
use serde::Serialize;
use tracing::debug;

use super::types::DateSpec;

/// Largest accepted `interval`; a thousand periods already spans decades
pub const MAX_INTERVAL: u32 = 1000;

/// How often a series repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Which day within the period an occurrence falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Weekly on this weekday
    Weekday(Weekday),
    /// Monthly on the n-th weekday; -1 is the last one
    OrdinalWeekday { ordinal: i8, weekday: Weekday },
    /// Monthly on this day number
    DayOfMonth(u32),
}

/// Description of how an event repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Repeat every `interval` periods
    pub interval: u32,
    pub selector: Option<Selector>,
    /// Total number of occurrences, including the first
    pub count: Option<u32>,
    /// Last day an occurrence may fall on
    pub until: Option<DateSpec>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            selector: None,
            count: None,
            until: None,
        }
    }

    /// Describe why this rule cannot be expanded, if it cannot
    pub fn shape_error(&self) -> Option<String> {
        if self.interval == 0 {
            return Some("interval must be at least 1".to_string());
        }
        if self.interval > MAX_INTERVAL {
            return Some(format!("interval {} is more than {}", self.interval, MAX_INTERVAL));
        }
        match (self.frequency, self.selector) {
            (_, None) => None,
            (Frequency::Weekly, Some(Selector::Weekday(_))) => None,
            (Frequency::Monthly, Some(Selector::OrdinalWeekday { ordinal, .. })) => {
                if (1..=5).contains(&ordinal) || ordinal == -1 {
                    None
                } else {
                    Some(format!("ordinal {} is not 1-5 or -1 (last)", ordinal))
                }
            }
            (Frequency::Monthly, Some(Selector::DayOfMonth(day))) => {
                if (1..=31).contains(&day) {
                    None
                } else {
                    Some(format!("day of month {} is out of range", day))
                }
            }
            (frequency, Some(selector)) => Some(format!("{:?} cannot be combined with {:?}", selector, frequency)),
        }
    }

    /// Check whether a date satisfies the selector
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self.selector {
            None => true,
            Some(Selector::Weekday(weekday)) => date.weekday() == weekday,
            Some(Selector::OrdinalWeekday { ordinal, weekday }) => {
                nth_weekday(date.year(), date.month(), ordinal, weekday) == Some(date)
            }
            Some(Selector::DayOfMonth(day)) => date.day() == day,
        }
    }

    /// Move `start` forward to the first date the selector accepts, keeping the time of day
    ///
    /// "The 3rd Tuesday of each month starting today" becomes the next 3rd Tuesday.
    pub fn align(&self, start: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        debug!(%start, ?self.selector, "RecurrenceRule::align: called");
        if self.selector.is_none() || self.matches(start.date_naive()) {
            return start;
        }
        // Every valid selector matches within 14 months (a 5th weekday turns up at least every quarter)
        let mut date = start.date_naive();
        for _ in 0..430 {
            let Some(next) = date.succ_opt() else {
                break;
            };
            date = next;
            if self.matches(date) {
                return with_date(start, date).unwrap_or(start);
            }
        }
        start
    }

    /// Expand into at most `limit` start times beginning with `first`
    ///
    /// `first` is expected to be aligned already. Stops at `count` or `until`,
    /// whichever comes first; periods without a matching day are skipped.
    pub fn occurrences(&self, first: DateTime<FixedOffset>, limit: usize) -> Vec<DateTime<FixedOffset>> {
        debug!(%first, %limit, ?self.count, ?self.until, "RecurrenceRule::occurrences: called");
        let want = self.count.map_or(limit, |c| (c as usize).min(limit));
        let mut out = Vec::with_capacity(want.min(64));
        if want == 0 || self.shape_error().is_some() {
            return out;
        }

        let first_date = first.date_naive();
        let until = self.until.as_ref().and_then(DateSpec::resolved).map(|t| t.date_naive());
        // Monthly rules can skip periods; bound the walk so a rule that never matches terminates
        let max_steps = want.saturating_mul(4).saturating_add(24);

        for step in 0..max_steps {
            // Periods past the end of the calendar end the series
            let Some(periods) = u32::try_from(step).ok().and_then(|s| s.checked_mul(self.interval)) else {
                break;
            };
            let date = match self.frequency {
                Frequency::Daily => first_date.checked_add_days(Days::new(u64::from(periods))),
                Frequency::Weekly => first_date.checked_add_days(Days::new(u64::from(periods) * 7)),
                Frequency::Monthly => {
                    let Some(month) = first_date
                        .with_day(1)
                        .and_then(|d| d.checked_add_months(Months::new(periods)))
                    else {
                        break;
                    };
                    match self.day_in_month(month, first_date.day()) {
                        Some(date) => Some(date),
                        // No matching day this month
                        None => continue,
                    }
                }
            };

            let Some(date) = date else {
                break;
            };
            if date < first_date {
                continue;
            }
            if let Some(until) = until
                && date > until
            {
                break;
            }
            let Some(start) = with_date(first, date) else {
                break;
            };
            out.push(start);
            if out.len() >= want {
                break;
            }
        }

        debug!(count = %out.len(), "RecurrenceRule::occurrences: expanded");
        out
    }

    /// The selected day of the month starting at `month`, else the same day number as `day`
    fn day_in_month(&self, month: NaiveDate, day: u32) -> Option<NaiveDate> {
        match self.selector {
            Some(Selector::OrdinalWeekday { ordinal, weekday }) => nth_weekday(month.year(), month.month(), ordinal, weekday),
            Some(Selector::DayOfMonth(selected)) => month.with_day(selected),
            Some(Selector::Weekday(_)) | None => month.with_day(day),
        }
    }
}

/// Same wall-clock time and offset on another day; `None` past the end of the calendar
fn with_date(t: DateTime<FixedOffset>, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    t.checked_add_signed(date - t.date_naive())
}

/// The `ordinal`-th `weekday` of a month (-1 for the last), if the month has one
pub fn nth_weekday(year: i32, month: u32, ordinal: i8, weekday: Weekday) -> Option<NaiveDate> {
    if ordinal == -1 {
        let last = NaiveDate::from_ymd_opt(year, month, 1)?
            .checked_add_months(Months::new(1))?
            .pred_opt()?;
        let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
        return last.checked_sub_days(Days::new(u64::from(back)));
    }
    if !(1..=5).contains(&ordinal) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let ahead = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let offset = u64::from(ahead) + 7 * u64::from(ordinal.unsigned_abs() - 1);
    let date = first.checked_add_days(Days::new(offset))?;
    (date.month() == month).then_some(date)
}

//! Resolution of date and time text into concrete local values
//!
//! The model is asked for absolute values, but relative phrases still slip
//! through. Anything not understood here stays `DateSpec::Unresolved` and is
//! rejected later with the original text quoted back.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::debug;

use crate::intent::DateSpec;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Resolve `raw` against the request time `now`, in `now`'s offset
pub fn resolve(raw: &str, now: DateTime<FixedOffset>) -> DateSpec {
    resolve_bound(raw, now, false)
}

/// Like [`resolve`], for the end of a range: a bare date means the whole of
/// that day, so it resolves to midnight at the start of the next one
pub fn resolve_end(raw: &str, now: DateTime<FixedOffset>) -> DateSpec {
    resolve_bound(raw, now, true)
}

fn resolve_bound(raw: &str, now: DateTime<FixedOffset>, through_day: bool) -> DateSpec {
    let text = raw.trim();
    let tz = *now.offset();

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return DateSpec::At(t.with_timezone(&tz));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return local(Some(naive), tz, raw);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return local(midnight(date, through_day), tz, raw);
    }
    if let Some((date, time)) = relative(&text.to_lowercase(), now.date_naive()) {
        let naive = match time {
            Some(time) => Some(date.and_time(time)),
            None => midnight(date, through_day),
        };
        return local(naive, tz, raw);
    }

    debug!(%raw, "dates::resolve: unresolved");
    DateSpec::Unresolved(raw.to_string())
}

/// Midnight starting `date`, or ending it when `through_day` is set
fn midnight(date: NaiveDate, through_day: bool) -> Option<NaiveDateTime> {
    let day = if through_day { date.succ_opt()? } else { date };
    Some(day.and_time(NaiveTime::MIN))
}

fn local(naive: Option<NaiveDateTime>, tz: FixedOffset, raw: &str) -> DateSpec {
    match naive.and_then(|n| n.and_local_timezone(tz).single()) {
        Some(t) => DateSpec::At(t),
        None => DateSpec::Unresolved(raw.to_string()),
    }
}

/// "tomorrow 7pm", "next friday at 19:00", "today"
fn relative(text: &str, today: NaiveDate) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let (day_part, time_part) = match text.split_once(" at ") {
        Some((day, time)) => (day.trim().to_string(), Some(time.trim().to_string())),
        None => split_trailing_time(text),
    };

    let date = match day_part.as_str() {
        "today" | "tonight" => today,
        "tomorrow" => today + Duration::days(1),
        _ => {
            let words: Vec<&str> = day_part.split_whitespace().collect();
            match words.as_slice() {
                [day] | ["this", day] => upcoming(today, parse_weekday(day)?, false),
                ["next", day] => upcoming(today, parse_weekday(day)?, true),
                _ => return None,
            }
        }
    };

    match time_part {
        Some(t) => Some((date, Some(parse_time_of_day(&t)?))),
        None => Some((date, None)),
    }
}

/// Split "friday 7pm" into ("friday", Some("7pm")) when the tail reads as a time
fn split_trailing_time(text: &str) -> (String, Option<String>) {
    let words: Vec<&str> = text.split_whitespace().collect();
    // "7:30 pm" is two words; try the longer tail first
    for tail_len in [2, 1] {
        if words.len() > tail_len {
            let (head, tail) = words.split_at(words.len() - tail_len);
            let tail = tail.join(" ");
            if parse_time_of_day(&tail).is_some() {
                return (head.join(" "), Some(tail));
            }
        }
    }
    (words.join(" "), None)
}

/// Next date falling on `weekday`; today counts unless `strictly_after`
fn upcoming(today: NaiveDate, weekday: Weekday, strictly_after: bool) -> NaiveDate {
    let mut ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    if ahead == 0 && strictly_after {
        ahead = 7;
    }
    today + Duration::days(i64::from(ahead))
}

/// Weekday from a full or three-letter English name
pub fn parse_weekday(text: &str) -> Option<Weekday> {
    let text = text.trim().to_lowercase();
    let day = match text.as_str() {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Time of day: "19:00", "19:00:00", "7pm", "7:30 pm", "noon", "midnight"
pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let text = text.trim().to_lowercase();
    match text.as_str() {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return Some(NaiveTime::MIN),
        _ => {}
    }

    let (clock, meridiem) = if let Some(rest) = text.strip_suffix("pm") {
        (rest.trim_end(), Some(12))
    } else if let Some(rest) = text.strip_suffix("am") {
        (rest.trim_end(), Some(0))
    } else {
        (text.as_str(), None)
    };

    let mut parts = clock.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) if m.len() == 2 => m.parse().ok()?,
        Some(_) => return None,
        None if meridiem.is_some() => 0,
        None => return None,
    };
    let second: u32 = match parts.next() {
        Some(s) if meridiem.is_none() && s.len() == 2 => s.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }

    let hour = match meridiem {
        Some(offset) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour % 12 + offset
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

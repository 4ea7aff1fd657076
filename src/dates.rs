//! Date parsing and formatting helpers.
//!
//! Dates coming from the server are parsed leniently: anything that is not a
//! valid calendar date (or timestamp, for audit fields) is treated as absent so
//! a single bad record degrades a metric instead of failing a whole fetch.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// Parse a date value as sent by the API: `YYYY-MM-DD`, or a full RFC 3339
/// timestamp whose UTC calendar date is used.
pub fn parse_api_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Parse a timestamp as sent by the API. A bare date is read as midnight UTC.
pub fn parse_api_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter: optional calendar date, malformed values become `None`.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_api_date))
}

/// Serde adapter: optional timestamp, malformed values become `None`.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_api_timestamp))
}

/// Whole days from `a` to `b` (negative when `b` precedes `a`).
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

pub fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

pub fn last_of_month(d: NaiveDate) -> NaiveDate {
    let (year, month) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first_of_next| first_of_next - Duration::days(1))
        .unwrap_or(d)
}

/// Shift a date by whole months, landing on the first of the resulting month.
pub fn add_months_to_first(d: NaiveDate, months: i32) -> NaiveDate {
    let index = d.year() * 12 + d.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(d)
}

/// Parse human-readable date input relative to `today`.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday".."sunday" (and short forms), optionally prefixed by "next"/"this"
/// - "end of month" / "eom"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD" format
pub fn parse_date_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of month" | "eom" => return Some(last_of_month(today)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
        if let Some(nm) = rest.strip_suffix('m') {
            if let Ok(months) = nm.trim().parse::<i64>() {
                // Approximate: 30 days per month
                return Some(today + Duration::days(months * 30));
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];

    let current_day = today.weekday().num_days_from_monday() as i64;
    for (day_name, target_day) in weekdays {
        let days_ahead = (target_day + 7 - current_day) % 7;
        if s == day_name || s == format!("this {day_name}") {
            return Some(today + Duration::days(days_ahead));
        }
        if s == format!("next {day_name}") {
            let days_to_add = if days_ahead == 0 { 7 } else { days_ahead + 7 };
            return Some(today + Duration::days(days_to_add));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = days_between(today, d);
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

/// Format an optional date as `YYYY-MM-DD`, or `-` when absent.
pub fn format_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_api_date_accepts_dates_and_timestamps() {
        assert_eq!(parse_api_date("2025-03-04"), Some(d(2025, 3, 4)));
        assert_eq!(parse_api_date("2025-03-04T22:10:00Z"), Some(d(2025, 3, 4)));
        assert_eq!(parse_api_date("2025-13-40"), None);
        assert_eq!(parse_api_date("soon"), None);
        assert_eq!(parse_api_date(""), None);
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(last_of_month(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(last_of_month(d(2025, 12, 3)), d(2025, 12, 31));
        assert_eq!(add_months_to_first(d(2025, 1, 15), -1), d(2024, 12, 1));
        assert_eq!(add_months_to_first(d(2025, 11, 15), 2), d(2026, 1, 1));
    }

    #[test]
    fn test_parse_date_input() {
        // 2025-04-02 is a Wednesday.
        let today = d(2025, 4, 2);
        assert_eq!(parse_date_input("tomorrow", today), Some(d(2025, 4, 3)));
        assert_eq!(parse_date_input("in 2w", today), Some(d(2025, 4, 16)));
        assert_eq!(parse_date_input("friday", today), Some(d(2025, 4, 4)));
        assert_eq!(parse_date_input("next wed", today), Some(d(2025, 4, 9)));
        assert_eq!(parse_date_input("eom", today), Some(d(2025, 4, 30)));
        assert_eq!(parse_date_input("2025-05-01", today), Some(d(2025, 5, 1)));
        assert_eq!(parse_date_input("whenever", today), None);
    }

    #[test]
    fn test_format_due_relative() {
        let today = d(2025, 4, 2);
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(Some(today), today), "today");
        assert_eq!(format_due_relative(Some(d(2025, 4, 5)), today), "in 3d");
        assert_eq!(format_due_relative(Some(d(2025, 3, 31)), today), "2d late");
    }
}

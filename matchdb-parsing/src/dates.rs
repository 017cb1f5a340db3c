use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m/%d/%y", "%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"];
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%I:%M%p", "%H:%M"];

// "Sat 9/14" or "Saturday 9/14" — schedule pages love to omit the year
static WEEKDAY_MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| {
        Regex::new(r"(?i)^(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+(\d{1,2})/(\d{1,2})\s*$")
            .unwrap()
    });

/// Parse a schedule-page date cell in any of the formats the sources use.
/// `default_year` fills in for weekday-only forms like "Sat 9/14".
pub fn parse_flexible_date(raw: &str, default_year: i32) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    if let Some(caps) = WEEKDAY_MONTH_DAY.captures(raw) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(default_year, month, day);
    }
    None
}

/// Parse a date-plus-optional-time cell ("9/14/2025 3:00 PM",
/// "Sat 9/14 3:00 PM", "2025-09-14"). The time half is best-effort: a date
/// with an unparseable time still yields the date.
pub fn parse_flexible_datetime(
    raw: &str,
    default_year: i32,
) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let raw = raw.trim();

    // Try the whole string as a bare date first
    if let Some(date) = parse_flexible_date(raw, default_year) {
        return Some((date, None));
    }

    // Otherwise split the trailing time words off and retry
    let words: Vec<&str> = raw.split_whitespace().collect();
    for split in (1..words.len()).rev() {
        let date_part = words[..split].join(" ");
        let Some(date) = parse_flexible_date(&date_part, default_year) else {
            continue;
        };
        let time_part = words[split..].join(" ");
        let time = TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(&time_part, fmt).ok());
        return Some((date, time));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn common_date_formats() {
        assert_eq!(parse_flexible_date("9/14/2025", 2025), Some(d(2025, 9, 14)));
        assert_eq!(parse_flexible_date("09/14/25", 2025), Some(d(2025, 9, 14)));
        assert_eq!(parse_flexible_date("2025-09-14", 2025), Some(d(2025, 9, 14)));
        assert_eq!(parse_flexible_date("Sep 14, 2025", 2025), Some(d(2025, 9, 14)));
    }

    #[test]
    fn weekday_form_uses_default_year() {
        assert_eq!(parse_flexible_date("Sat 9/14", 2025), Some(d(2025, 9, 14)));
        assert_eq!(parse_flexible_date("Saturday, 9/14", 2025), Some(d(2025, 9, 14)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_flexible_date("", 2025), None);
        assert_eq!(parse_flexible_date("TBD", 2025), None);
        assert_eq!(parse_flexible_date("13/45/2025", 2025), None);
    }

    #[test]
    fn datetime_with_time() {
        let (date, time) = parse_flexible_datetime("9/14/2025 3:00 PM", 2025).unwrap();
        assert_eq!(date, d(2025, 9, 14));
        assert_eq!(time, NaiveTime::from_hms_opt(15, 0, 0));
    }

    #[test]
    fn weekday_datetime() {
        let (date, time) = parse_flexible_datetime("Sat 9/14 3:00 PM", 2025).unwrap();
        assert_eq!(date, d(2025, 9, 14));
        assert_eq!(time, NaiveTime::from_hms_opt(15, 0, 0));
    }

    #[test]
    fn bare_date_has_no_time() {
        let (date, time) = parse_flexible_datetime("2025-09-14", 2025).unwrap();
        assert_eq!(date, d(2025, 9, 14));
        assert_eq!(time, None);
    }

    #[test]
    fn date_with_unparseable_time_still_yields_date() {
        let (date, time) = parse_flexible_datetime("9/14/2025 kickoff", 2025).unwrap();
        assert_eq!(date, d(2025, 9, 14));
        assert_eq!(time, None);
    }
}

//! Korean date, time, and session-range fragments as they appear on exam
//! notices and internal memos.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[-./년]\s*(\d{1,2})\s*[-./월]\s*(\d{1,2})\s*일?").expect("Invalid ISO date regex")
});

static KOREAN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*월\s*(\d{1,2})\s*일").expect("Invalid Korean date regex"));

static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\s*[/.]\s*(\d{1,2})$").expect("Invalid short date regex"));

static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(오전|오후)\s*(\d{1,2})\s*(?:시(?:\s*(\d{1,2})\s*분|\s*(반))?|:(\d{2}))")
        .expect("Invalid meridiem time regex")
});

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("Invalid clock time regex"));

static HOUR_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*시(?:\s*(\d{1,2})\s*분|\s*(반))?").expect("Invalid hour time regex")
});

static CLOCK_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}:\d{2})\s*[~\-–]\s*(\d{1,2}:\d{2})").expect("Invalid clock range regex")
});

static HOUR_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*시\s*[~\-–]\s*(\d{1,2})\s*시").expect("Invalid hour range regex")
});

static SESSION_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3})\s*(?:차)?\s*[~\-–]\s*(\d{1,3})\s*차").expect("Invalid session range regex")
});

static SESSION_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*차").expect("Invalid session regex"));

/// Upper bound on sessions a single range token may expand to.
const MAX_SESSION_SPAN: u32 = 60;

/// Parses one date fragment. Fragments without a year ("11월 10일", "11/10")
/// take the hinted year; the year is never inferred from context.
pub fn parse_date(raw: &str, year: i32) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(caps) = ISO_DATE.captures(raw) {
        let y = caps[1].parse().ok()?;
        let m = caps[2].parse().ok()?;
        let d = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let Some(caps) = KOREAN_DATE.captures(raw) {
        return ymd_with_year(year, &caps[1], &caps[2]);
    }
    if let Some(caps) = SHORT_DATE.captures(raw) {
        return ymd_with_year(year, &caps[1], &caps[2]);
    }
    None
}

fn ymd_with_year(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let padded = format!("{year:04}-{month:02}-{day:02}");
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d").ok()
}

/// All dates in `text`, in order of appearance, together with the byte span
/// of each match.
pub fn find_dates(text: &str, year: i32) -> Vec<(NaiveDate, std::ops::Range<usize>)> {
    let mut found: Vec<(NaiveDate, std::ops::Range<usize>)> = ISO_DATE
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )?;
            Some((date, m.range()))
        })
        .collect();

    for caps in KOREAN_DATE.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if found.iter().any(|(_, r)| r.start <= m.start() && m.end() <= r.end) {
            continue;
        }
        if let Some(date) = ymd_with_year(year, &caps[1], &caps[2]) {
            found.push((date, m.range()));
        }
    }

    found.sort_by_key(|(_, r)| r.start);
    found
}

/// Converts a 12-hour clock reading to 24-hour: 오전 12시 is midnight,
/// 오후 12시 is noon.
pub fn to_24_hour(is_pm: bool, hour: u32) -> Option<u32> {
    if hour > 12 {
        return None;
    }
    Some(match (is_pm, hour) {
        (false, 12) => 0,
        (false, h) => h,
        (true, 12) => 12,
        (true, h) => h + 12,
    })
}

/// Parses the first time-of-day in `raw`. Meridiem forms win over bare
/// clock or hour forms.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    if let Some(caps) = MERIDIEM_TIME.captures(raw) {
        let is_pm = &caps[1] == "오후";
        let hour = to_24_hour(is_pm, caps[2].parse().ok()?)?;
        let minute = minutes_from(&caps, 3, 4).or_else(|| caps.get(5).and_then(|m| m.as_str().parse().ok()));
        return NaiveTime::from_hms_opt(hour, minute.unwrap_or(0), 0);
    }
    if let Some(caps) = CLOCK_TIME.captures(raw) {
        return NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0);
    }
    for caps in HOUR_TIME.captures_iter(raw) {
        let Some(m) = caps.get(0) else { continue };
        // "시험" / "시작" are words, not an hour marker.
        if matches!(raw[m.end()..].chars().next(), Some('험' | '작' | '행')) && caps.get(2).is_none() {
            continue;
        }
        let hour: u32 = caps[1].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minutes_from(&caps, 2, 3).unwrap_or(0), 0);
    }
    None
}

fn minutes_from(caps: &regex::Captures<'_>, minute_idx: usize, half_idx: usize) -> Option<u32> {
    if let Some(m) = caps.get(minute_idx) {
        return m.as_str().parse().ok();
    }
    caps.get(half_idx).map(|_| 30)
}

/// Parses an exam time window such as "10:00~12:00" or "10시~12시".
pub fn parse_time_range(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    if let Some(caps) = CLOCK_RANGE.captures(raw) {
        return Some((parse_time(&caps[1])?, parse_time(&caps[2])?));
    }
    if let Some(caps) = HOUR_RANGE.captures(raw) {
        let start = NaiveTime::from_hms_opt(caps[1].parse().ok()?, 0, 0)?;
        let end = NaiveTime::from_hms_opt(caps[2].parse().ok()?, 0, 0)?;
        return Some((start, end));
    }
    None
}

/// A session token ("1~4차", "3차") normalised to its label and the ordered
/// session numbers it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRange {
    pub label: String,
    pub numbers: Vec<u32>,
}

/// Finds the first session-range token in `raw`. Ranges take precedence over
/// single sessions so that "1~4차" is never read as "4차".
pub fn parse_session_range(raw: &str) -> Option<SessionRange> {
    if let Some(caps) = SESSION_RANGE.captures(raw) {
        let start: u32 = caps[1].parse().ok()?;
        let end: u32 = caps[2].parse().ok()?;
        if start == 0 || end < start || end - start >= MAX_SESSION_SPAN {
            return None;
        }
        return Some(SessionRange {
            label: format!("{start}~{end}차"),
            numbers: (start..=end).collect(),
        });
    }
    let caps = SESSION_SINGLE.captures(raw)?;
    let n: u32 = caps[1].parse().ok()?;
    if n == 0 {
        return None;
    }
    Some(SessionRange {
        label: format!("{n}차"),
        numbers: vec![n],
    })
}

/// The single session number in `raw` ("1차"), ignoring ranges.
pub fn parse_session_number(raw: &str) -> Option<u32> {
    if SESSION_RANGE.is_match(raw) {
        return None;
    }
    let caps = SESSION_SINGLE.captures(raw)?;
    caps[1].parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_afternoon_twelve_is_noon() {
        assert_eq!(parse_time("오후 12시"), Some(t(12, 0)));
    }

    #[test]
    fn test_morning_twelve_is_midnight() {
        assert_eq!(parse_time("오전 12시"), Some(t(0, 0)));
    }

    #[test]
    fn test_afternoon_two_is_fourteen() {
        assert_eq!(parse_time("오후 2시"), Some(t(14, 0)));
    }

    #[test]
    fn test_morning_eleven_unchanged() {
        assert_eq!(parse_time("오전 11시"), Some(t(11, 0)));
    }

    #[test]
    fn test_meridiem_with_minutes_and_half() {
        assert_eq!(parse_time("오후 3시 30분"), Some(t(15, 30)));
        assert_eq!(parse_time("오전 9시 반"), Some(t(9, 30)));
        assert_eq!(parse_time("오후 1:15"), Some(t(13, 15)));
    }

    #[test]
    fn test_to_24_hour_rejects_out_of_range() {
        assert_eq!(to_24_hour(true, 13), None);
    }

    #[test]
    fn test_clock_and_hour_forms() {
        assert_eq!(parse_time("14:00"), Some(t(14, 0)));
        assert_eq!(parse_time("17시 마감"), Some(t(17, 0)));
    }

    #[test]
    fn test_exam_word_is_not_an_hour() {
        assert_eq!(parse_time("4차 시험 안내"), None);
        assert_eq!(parse_time("11월 4일 시험접수마감"), None);
    }

    #[test]
    fn test_time_range_forms() {
        assert_eq!(parse_time_range("10:00~12:00"), Some((t(10, 0), t(12, 0))));
        assert_eq!(parse_time_range("14시 - 16시"), Some((t(14, 0), t(16, 0))));
        assert_eq!(parse_time_range("11월 10일"), None);
    }

    #[test]
    fn test_korean_date_zero_padded_with_hint_year() {
        assert_eq!(parse_date("11월 4일(화)", 2025), Some(d(2025, 11, 4)));
        assert_eq!(parse_date("3월 9일", 2026), Some(d(2026, 3, 9)));
    }

    #[test]
    fn test_explicit_year_forms() {
        assert_eq!(parse_date("2025-11-10", 1999), Some(d(2025, 11, 10)));
        assert_eq!(parse_date("2025.11.10", 1999), Some(d(2025, 11, 10)));
        assert_eq!(parse_date("2025년 11월 10일", 1999), Some(d(2025, 11, 10)));
    }

    #[test]
    fn test_short_slash_date() {
        assert_eq!(parse_date("11/10", 2025), Some(d(2025, 11, 10)));
    }

    #[test]
    fn test_invalid_calendar_date_is_dropped() {
        assert_eq!(parse_date("2월 30일", 2025), None);
        assert_eq!(parse_date("", 2025), None);
    }

    #[test]
    fn test_find_dates_in_order() {
        let found = find_dates("접수 10월 1일 ~ 10월 5일, 시험 11월 10일", 2025);
        let dates: Vec<_> = found.into_iter().map(|(date, _)| date).collect();
        assert_eq!(dates, vec![d(2025, 10, 1), d(2025, 10, 5), d(2025, 11, 10)]);
    }

    #[test]
    fn test_session_range_expands() {
        let range = parse_session_range("1~4차 시험접수마감").unwrap();
        assert_eq!(range.label, "1~4차");
        assert_eq!(range.numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_single_session_token() {
        let range = parse_session_range("7차 접수").unwrap();
        assert_eq!(range.label, "7차");
        assert_eq!(range.numbers, vec![7]);
        assert_eq!(parse_session_number("수도권 1차"), Some(1));
        assert_eq!(parse_session_number("1~4차"), None);
    }

    #[test]
    fn test_reversed_session_range_rejected() {
        assert_eq!(parse_session_range("4~1차"), None);
    }
}

//! Demo fallbacks used when the structuring endpoint reports quota exhaustion,
//! so the UI stays exercisable without live credentials. Every record built
//! here carries `DEMO_NOTE` and must never be treated as authoritative.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::schedule::locations::expand_group;
use crate::schedule::parsing::{find_dates, parse_session_range, parse_time};
use crate::schedule::structurer::ExtractionHint;
use crate::schedule::types::{ExamType, InternalDeadline, OfficialSession};

pub const DEMO_NOTE: &str = "[데모 데이터: API 할당량 초과]";

/// Days ahead of `today` used when no date can be read from the text.
const DEMO_EXAM_LEAD_DAYS: i64 = 14;
const DEMO_DEADLINE_LEAD_DAYS: i64 = 5;

/// Request-scoped record of which extraction paths fell back to demo data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DemoFallbackLog {
    pub count: u32,
    pub paths: Vec<&'static str>,
}

impl DemoFallbackLog {
    pub fn record(&mut self, path: &'static str) {
        self.count += 1;
        self.paths.push(path);
    }
}

fn demo_exam_type(text: &str, hint: &ExtractionHint) -> ExamType {
    ExamType::sniff(text)
        .or(hint.exam_type)
        .unwrap_or(ExamType::Life)
}

fn first_date(text: &str, year: i32) -> Option<NaiveDate> {
    find_dates(text, year).into_iter().next().map(|(d, _)| d)
}

/// One placeholder session for the capital region.
pub fn demo_official(text: &str, hint: &ExtractionHint, today: NaiveDate) -> OfficialSession {
    OfficialSession {
        year: hint.year,
        exam_type: demo_exam_type(text, hint),
        session_number: Some(1),
        registration_start: None,
        registration_end: None,
        exam_date: Some(
            first_date(text, hint.year).unwrap_or(today + Duration::days(DEMO_EXAM_LEAD_DAYS)),
        ),
        exam_time_start: default_time(10),
        exam_time_end: default_time(12),
        locations: expand_group("수도권"),
        notes: DEMO_NOTE.to_string(),
    }
}

/// One placeholder deadline. Reads whatever session token, date, and time the
/// text offers; otherwise estimates the deadline a few days out.
pub fn demo_internal(text: &str, hint: &ExtractionHint, today: NaiveDate) -> InternalDeadline {
    let range = parse_session_range(text);
    InternalDeadline {
        year: hint.year,
        exam_type: demo_exam_type(text, hint),
        session_range: range
            .as_ref()
            .map(|r| r.label.clone())
            .unwrap_or_else(|| "1차".to_string()),
        session_numbers: range.map(|r| r.numbers).unwrap_or_else(|| vec![1]),
        deadline_date: first_date(text, hint.year)
            .unwrap_or(today + Duration::days(DEMO_DEADLINE_LEAD_DAYS)),
        deadline_time: parse_time(text).unwrap_or(default_time(10)),
        notice_date: None,
        notice_time: None,
        notes: DEMO_NOTE.to_string(),
    }
}

fn default_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

//! Session Extractor (Official) — turns structured notice payloads and raw
//! crawl rows into `OfficialSession` records.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::schedule::crawl::CrawlRow;
use crate::schedule::demo::demo_official;
use crate::schedule::error::ExtractionError;
use crate::schedule::locations;
use crate::schedule::parsing::{find_dates, parse_date, parse_session_number, parse_time, parse_time_range};
use crate::schedule::structurer::{ExtractionHint, ScheduleStructurer, StructureKind};
use crate::schedule::types::{ExamType, OfficialSession};

/// Business default exam window when the source states no time.
pub const DEFAULT_EXAM_START: (u32, u32) = (10, 0);
pub const DEFAULT_EXAM_END: (u32, u32) = (12, 0);
/// Exam duration assumed when only a start time is printed.
const DEFAULT_EXAM_HOURS: i64 = 2;

/// Records produced by one extraction path, plus whether they are demo data.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome<T> {
    pub records: Vec<T>,
    pub demo_fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleEnvelope<T> {
    pub schedules: Vec<T>,
}

/// Numbers and labels both occur in completions ("session_number": "1차").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrText {
    List(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOfficialRecord {
    pub year: Option<NumberOrText>,
    pub exam_type: Option<String>,
    pub session_number: Option<NumberOrText>,
    pub registration_start: Option<String>,
    pub registration_end: Option<String>,
    pub registration_period: Option<String>,
    pub exam_date: Option<String>,
    pub exam_time_start: Option<String>,
    pub exam_time_end: Option<String>,
    pub exam_time: Option<String>,
    pub locations: Option<ListOrText>,
    pub notes: Option<String>,
}

pub(crate) fn year_of(raw: Option<&NumberOrText>, fallback: i32) -> i32 {
    match raw {
        Some(NumberOrText::Number(n)) => i32::try_from(*n).unwrap_or(fallback),
        Some(NumberOrText::Text(s)) => s.trim().trim_end_matches('년').parse().unwrap_or(fallback),
        None => fallback,
    }
}

fn session_of(raw: Option<&NumberOrText>) -> Option<u32> {
    match raw? {
        NumberOrText::Number(n) => u32::try_from(*n).ok().filter(|n| *n > 0),
        NumberOrText::Text(s) => s
            .trim()
            .parse()
            .ok()
            .filter(|n: &u32| *n > 0)
            .or_else(|| parse_session_number(s)),
    }
}

pub(crate) fn resolve_exam_type(
    raw: Option<&str>,
    hint: &ExtractionHint,
) -> Result<ExamType, ExtractionError> {
    if let Some(label) = raw.filter(|l| !l.trim().is_empty()) {
        return ExamType::from_label(label)
            .or_else(|| ExamType::sniff(label))
            .ok_or_else(|| ExtractionError::MalformedResponse(format!("unknown exam_type '{label}'")));
    }
    hint.exam_type
        .ok_or_else(|| ExtractionError::MalformedResponse("exam_type missing and no hint given".into()))
}

fn hm(hm: (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(hm.0, hm.1, 0).unwrap_or(NaiveTime::MIN)
}

fn exam_window(raw: &RawOfficialRecord) -> (NaiveTime, NaiveTime) {
    if let Some((start, end)) = raw.exam_time.as_deref().and_then(parse_time_range) {
        return (start, end);
    }
    let start = raw
        .exam_time_start
        .as_deref()
        .or(raw.exam_time.as_deref())
        .and_then(parse_time);
    let end = raw.exam_time_end.as_deref().and_then(parse_time);
    match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, s + Duration::hours(DEFAULT_EXAM_HOURS)),
        (None, Some(e)) => (e - Duration::hours(DEFAULT_EXAM_HOURS), e),
        (None, None) => (hm(DEFAULT_EXAM_START), hm(DEFAULT_EXAM_END)),
    }
}

fn registration_window(raw: &RawOfficialRecord, year: i32) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = raw.registration_start.as_deref().and_then(|s| parse_date(s, year));
    let end = raw.registration_end.as_deref().and_then(|s| parse_date(s, year));
    if start.is_some() || end.is_some() {
        return (start, end);
    }
    let period: Vec<NaiveDate> = raw
        .registration_period
        .as_deref()
        .map(|p| find_dates(p, year).into_iter().map(|(d, _)| d).collect())
        .unwrap_or_default();
    (period.first().copied(), period.get(1).copied())
}

/// Converts one structured record. Unparseable dates become null rather than
/// failing the record.
pub fn official_from_raw(
    raw: RawOfficialRecord,
    hint: &ExtractionHint,
) -> Result<OfficialSession, ExtractionError> {
    let year = year_of(raw.year.as_ref(), hint.year);
    let exam_type = resolve_exam_type(raw.exam_type.as_deref(), hint)?;
    let (exam_time_start, exam_time_end) = exam_window(&raw);
    let (registration_start, registration_end) = registration_window(&raw, year);
    let locations = match &raw.locations {
        Some(ListOrText::List(tokens)) => {
            let split: Vec<&str> = tokens.iter().flat_map(|t| locations::tokenize(t)).collect();
            locations::normalize(&split)
        }
        Some(ListOrText::Text(text)) => locations::normalize_text(text),
        None => Default::default(),
    };

    Ok(OfficialSession {
        year,
        exam_type,
        session_number: session_of(raw.session_number.as_ref()),
        registration_start,
        registration_end,
        exam_date: raw.exam_date.as_deref().and_then(|s| parse_date(s, year)),
        exam_time_start,
        exam_time_end,
        locations,
        notes: raw.notes.unwrap_or_default().trim().to_string(),
    })
}

/// Validates a `{ "schedules": [...] }` payload and converts every record.
/// A payload that is not the envelope is a `MalformedResponse`; individual
/// records that cannot be typed are skipped and logged.
pub fn parse_official_payload(
    payload: Value,
    hint: &ExtractionHint,
) -> Result<Vec<OfficialSession>, ExtractionError> {
    let envelope: ScheduleEnvelope<RawOfficialRecord> = serde_json::from_value(payload)
        .map_err(|e| ExtractionError::MalformedResponse(format!("official schedules: {e}")))?;

    let mut sessions = Vec::with_capacity(envelope.schedules.len());
    for raw in envelope.schedules {
        match official_from_raw(raw, hint) {
            Ok(session) => sessions.push(session),
            Err(e) => warn!("Skipping official record: {e}"),
        }
    }
    Ok(sessions)
}

/// Full official extraction: structure the text, then type the records. Quota
/// exhaustion degrades to a single demo session; every other error is returned.
pub async fn extract_official(
    structurer: &dyn ScheduleStructurer,
    text: &str,
    hint: &ExtractionHint,
    today: NaiveDate,
) -> Result<ExtractionOutcome<OfficialSession>, ExtractionError> {
    match structurer.structure(StructureKind::Official, text, hint).await {
        Ok(payload) => {
            let records = parse_official_payload(payload, hint)?;
            info!(
                "Official extraction ({}) produced {} sessions",
                structurer.backend(),
                records.len()
            );
            Ok(ExtractionOutcome {
                records,
                demo_fallback: false,
            })
        }
        Err(ExtractionError::UpstreamQuota(reason)) => {
            warn!("Official extraction quota exhausted ({reason}); using demo session");
            Ok(ExtractionOutcome {
                records: vec![demo_official(text, hint, today)],
                demo_fallback: true,
            })
        }
        Err(e) => Err(e),
    }
}

/// Converts crawl rows into sessions. Rows never carry a session number here;
/// numbering belongs to the grouping pass.
pub fn official_from_crawl_rows(rows: &[CrawlRow], year: i32, exam_type: ExamType) -> Vec<OfficialSession> {
    rows.iter()
        .map(|row| {
            let raw = RawOfficialRecord {
                exam_date: Some(row.exam_date.clone()),
                exam_time: row.exam_time.clone(),
                registration_period: row.registration_period.clone(),
                locations: Some(ListOrText::Text(row.region.clone())),
                ..Default::default()
            };
            let (exam_time_start, exam_time_end) = exam_window(&raw);
            let (registration_start, registration_end) = registration_window(&raw, year);
            OfficialSession {
                year,
                exam_type,
                session_number: None,
                registration_start,
                registration_end,
                exam_date: parse_date(&row.exam_date, year),
                exam_time_start,
                exam_time_end,
                locations: locations::normalize_text(&row.region),
                notes: String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::schedule::locations::CityId;
    use crate::schedule::structurer::RuleStructurer;

    fn hint() -> ExtractionHint {
        ExtractionHint {
            year: 2025,
            exam_type: Some(ExamType::Life),
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_raw_record_defaults_and_hint_year() {
        let payload = json!({
            "schedules": [{
                "session_number": "2차",
                "exam_date": "11월 10일",
                "locations": ["수도권", "사천"]
            }]
        });
        let sessions = parse_official_payload(payload, &hint()).unwrap();
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.year, 2025);
        assert_eq!(s.exam_type, ExamType::Life);
        assert_eq!(s.session_number, Some(2));
        assert_eq!(s.exam_date, Some(d(11, 10)));
        assert_eq!((s.exam_time_start, s.exam_time_end), (t(10), t(12)));
        let expected: BTreeSet<CityId> = [CityId::Seoul, CityId::Incheon, CityId::Jeju].into();
        assert_eq!(s.locations, expected);
    }

    #[test]
    fn test_start_time_only_defaults_two_hour_window() {
        let raw = RawOfficialRecord {
            exam_date: Some("2025-11-10".into()),
            exam_time_start: Some("14:00".into()),
            ..Default::default()
        };
        let s = official_from_raw(raw, &hint()).unwrap();
        assert_eq!((s.exam_time_start, s.exam_time_end), (t(14), t(16)));
    }

    #[test]
    fn test_registration_period_text_is_split() {
        let raw = RawOfficialRecord {
            registration_period: Some("10월 1일 ~ 10월 5일".into()),
            ..Default::default()
        };
        let s = official_from_raw(raw, &hint()).unwrap();
        assert_eq!(s.registration_start, Some(d(10, 1)));
        assert_eq!(s.registration_end, Some(d(10, 5)));
    }

    #[test]
    fn test_non_envelope_payload_is_malformed() {
        let err = parse_official_payload(json!(["not", "an", "envelope"]), &hint()).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn test_unknown_exam_type_record_is_skipped() {
        let payload = json!({
            "schedules": [
                {"exam_type": "변액", "session_number": 1},
                {"exam_type": "손해보험", "session_number": 1}
            ]
        });
        let sessions = parse_official_payload(payload, &hint()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].exam_type, ExamType::NonLife);
    }

    #[test]
    fn test_crawl_rows_have_no_session_number() {
        let rows = vec![CrawlRow {
            region: "영남".into(),
            exam_date: "2025-11-10".into(),
            exam_time: Some("10:00~11:40".into()),
            registration_period: None,
        }];
        let sessions = official_from_crawl_rows(&rows, 2025, ExamType::NonLife);
        assert_eq!(sessions[0].session_number, None);
        assert_eq!(sessions[0].exam_time_end, NaiveTime::from_hms_opt(11, 40, 0).unwrap());
        assert_eq!(sessions[0].locations, BTreeSet::from([CityId::Busan, CityId::Ulsan]));
    }

    struct QuotaStructurer;

    #[async_trait::async_trait]
    impl ScheduleStructurer for QuotaStructurer {
        async fn structure(
            &self,
            _kind: StructureKind,
            _text: &str,
            _hint: &ExtractionHint,
        ) -> Result<Value, ExtractionError> {
            Err(ExtractionError::UpstreamQuota("insufficient_quota".into()))
        }

        fn backend(&self) -> &'static str {
            "quota"
        }
    }

    #[tokio::test]
    async fn test_quota_exhaustion_falls_back_to_tagged_demo() {
        let outcome = extract_official(&QuotaStructurer, "손보 안내", &hint(), d(10, 1))
            .await
            .unwrap();
        assert!(outcome.demo_fallback);
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].notes.contains("데모"));
    }

    #[tokio::test]
    async fn test_rule_backed_extraction_end_to_end() {
        let outcome = extract_official(
            &RuleStructurer,
            "수도권 1차 11월 10일, 영남 1차 11월 10일",
            &hint(),
            d(10, 1),
        )
        .await
        .unwrap();
        assert!(!outcome.demo_fallback);
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|s| s.session_number == Some(1)));
    }
}

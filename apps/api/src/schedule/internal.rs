//! Session Extractor (Internal) — turns the company's deadline memo into
//! `InternalDeadline` records.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::schedule::demo::demo_internal;
use crate::schedule::error::ExtractionError;
use crate::schedule::official::{
    resolve_exam_type, year_of, ExtractionOutcome, NumberOrText, ScheduleEnvelope,
};
use crate::schedule::parsing::{parse_date, parse_session_range, parse_time, SessionRange};
use crate::schedule::structurer::{ExtractionHint, ScheduleStructurer, StructureKind};
use crate::schedule::types::InternalDeadline;

/// Deadline time when the memo states none. Deliberately distinct from the
/// official exam-time default.
pub const DEFAULT_DEADLINE_TIME: (u32, u32) = (10, 0);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawInternalRecord {
    pub year: Option<NumberOrText>,
    pub exam_type: Option<String>,
    pub session_range: Option<NumberOrText>,
    pub session_numbers: Vec<u32>,
    pub deadline_date: Option<String>,
    pub deadline_time: Option<String>,
    pub notice_date: Option<String>,
    pub notice_time: Option<String>,
    pub notes: Option<String>,
}

fn session_range_of(raw: &RawInternalRecord) -> Option<SessionRange> {
    let from_range = match raw.session_range.as_ref() {
        Some(NumberOrText::Text(s)) => parse_session_range(s)
            .or_else(|| parse_session_range(&format!("{}차", s.trim()))),
        Some(NumberOrText::Number(n)) => u32::try_from(*n)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| SessionRange {
                label: format!("{n}차"),
                numbers: vec![n],
            }),
        None => None,
    };
    if from_range.is_some() {
        return from_range;
    }

    let mut numbers: Vec<u32> = raw.session_numbers.iter().copied().filter(|n| *n > 0).collect();
    numbers.sort_unstable();
    numbers.dedup();
    let (first, last) = (*numbers.first()?, *numbers.last()?);
    let label = if first == last {
        format!("{first}차")
    } else if numbers.len() as u32 == last - first + 1 {
        format!("{first}~{last}차")
    } else {
        let listed: Vec<String> = numbers.iter().map(u32::to_string).collect();
        format!("{}차", listed.join(","))
    };
    Some(SessionRange { label, numbers })
}

/// Converts one structured record. A record without a recognisable session
/// token or deadline date cannot be reconciled and is rejected.
pub fn internal_from_raw(
    raw: RawInternalRecord,
    hint: &ExtractionHint,
) -> Result<InternalDeadline, ExtractionError> {
    let year = year_of(raw.year.as_ref(), hint.year);
    let exam_type = resolve_exam_type(raw.exam_type.as_deref(), hint)?;
    let range = session_range_of(&raw)
        .ok_or_else(|| ExtractionError::MalformedResponse("session_range missing".into()))?;
    let deadline_date = raw
        .deadline_date
        .as_deref()
        .and_then(|s| parse_date(s, year))
        .ok_or_else(|| {
            ExtractionError::MalformedResponse(format!("deadline_date missing for {}", range.label))
        })?;
    let deadline_time = raw
        .deadline_time
        .as_deref()
        .and_then(parse_time)
        .unwrap_or_else(default_deadline_time);

    Ok(InternalDeadline {
        year,
        exam_type,
        session_range: range.label,
        session_numbers: range.numbers,
        deadline_date,
        deadline_time,
        notice_date: raw.notice_date.as_deref().and_then(|s| parse_date(s, year)),
        notice_time: raw.notice_time.as_deref().and_then(parse_time),
        notes: raw.notes.unwrap_or_default().trim().to_string(),
    })
}

fn default_deadline_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_DEADLINE_TIME.0, DEFAULT_DEADLINE_TIME.1, 0)
        .unwrap_or(NaiveTime::MIN)
}

pub fn parse_internal_payload(
    payload: Value,
    hint: &ExtractionHint,
) -> Result<Vec<InternalDeadline>, ExtractionError> {
    let envelope: ScheduleEnvelope<RawInternalRecord> = serde_json::from_value(payload)
        .map_err(|e| ExtractionError::MalformedResponse(format!("internal schedules: {e}")))?;

    let mut deadlines = Vec::with_capacity(envelope.schedules.len());
    for raw in envelope.schedules {
        match internal_from_raw(raw, hint) {
            Ok(deadline) => deadlines.push(deadline),
            Err(e) => warn!("Skipping internal record: {e}"),
        }
    }
    Ok(deadlines)
}

/// Full internal extraction, independent of the official path. Quota
/// exhaustion degrades to a demo deadline.
pub async fn extract_internal(
    structurer: &dyn ScheduleStructurer,
    text: &str,
    hint: &ExtractionHint,
    today: NaiveDate,
) -> Result<ExtractionOutcome<InternalDeadline>, ExtractionError> {
    match structurer.structure(StructureKind::Internal, text, hint).await {
        Ok(payload) => {
            let records = parse_internal_payload(payload, hint)?;
            info!(
                "Internal extraction ({}) produced {} deadlines",
                structurer.backend(),
                records.len()
            );
            Ok(ExtractionOutcome {
                records,
                demo_fallback: false,
            })
        }
        Err(ExtractionError::UpstreamQuota(reason)) => {
            warn!("Internal extraction quota exhausted ({reason}); using demo deadline");
            Ok(ExtractionOutcome {
                records: vec![demo_internal(text, hint, today)],
                demo_fallback: true,
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schedule::structurer::RuleStructurer;
    use crate::schedule::types::ExamType;

    fn hint() -> ExtractionHint {
        ExtractionHint {
            year: 2025,
            exam_type: Some(ExamType::Life),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_range_expands_and_meridiem_converts() {
        let payload = json!({
            "schedules": [{
                "session_range": "1~4차",
                "deadline_date": "11월 4일(화)",
                "deadline_time": "오전 11시"
            }]
        });
        let deadlines = parse_internal_payload(payload, &hint()).unwrap();
        let d = &deadlines[0];
        assert_eq!(d.session_numbers, vec![1, 2, 3, 4]);
        assert_eq!(d.session_range, "1~4차");
        assert_eq!(d.deadline_date, NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
        assert_eq!(d.deadline_time, t(11, 0));
    }

    #[test]
    fn test_noon_and_midnight_edge_cases() {
        let make = |time: &str| RawInternalRecord {
            session_range: Some(NumberOrText::Text("1차".into())),
            deadline_date: Some("2025-11-04".into()),
            deadline_time: Some(time.into()),
            ..Default::default()
        };
        assert_eq!(internal_from_raw(make("오후 12시"), &hint()).unwrap().deadline_time, t(12, 0));
        assert_eq!(internal_from_raw(make("오전 12시"), &hint()).unwrap().deadline_time, t(0, 0));
        assert_eq!(internal_from_raw(make("오후 2시"), &hint()).unwrap().deadline_time, t(14, 0));
    }

    #[test]
    fn test_missing_time_defaults_to_ten() {
        let raw = RawInternalRecord {
            session_range: Some(NumberOrText::Number(3)),
            deadline_date: Some("11월 4일".into()),
            ..Default::default()
        };
        let d = internal_from_raw(raw, &hint()).unwrap();
        assert_eq!(d.deadline_time, t(10, 0));
        assert_eq!(d.session_range, "3차");
        assert!(d.notice_date.is_none() && d.notice_time.is_none());
    }

    #[test]
    fn test_bare_number_range_text_and_explicit_list() {
        let raw = RawInternalRecord {
            session_range: Some(NumberOrText::Text("5~6".into())),
            deadline_date: Some("11월 4일".into()),
            ..Default::default()
        };
        assert_eq!(internal_from_raw(raw, &hint()).unwrap().session_numbers, vec![5, 6]);

        let raw = RawInternalRecord {
            session_numbers: vec![4, 2, 3, 2],
            deadline_date: Some("11월 4일".into()),
            ..Default::default()
        };
        let d = internal_from_raw(raw, &hint()).unwrap();
        assert_eq!(d.session_numbers, vec![2, 3, 4]);
        assert_eq!(d.session_range, "2~4차");
    }

    #[test]
    fn test_record_without_deadline_is_skipped() {
        let payload = json!({ "schedules": [{ "session_range": "1차" }] });
        assert!(parse_internal_payload(payload, &hint()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_schedules_key_is_malformed() {
        let err = parse_internal_payload(json!({ "items": [] }), &hint()).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_rule_backed_internal_extraction() {
        let outcome = extract_internal(
            &RuleStructurer,
            "1~4차 시험접수마감: 11월 4일(화) 오전 11시",
            &hint(),
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].deadline_time, t(11, 0));
        assert_eq!(outcome.records[0].exam_type, ExamType::Life);
    }
}

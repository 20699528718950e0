use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::locations::CityId;

/// Namespace for deterministic schedule ids, so reconciling the same inputs
/// twice yields the same ids and persistence is an idempotent upsert.
const SCHEDULE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5d0c_8a4e_2b1f_4c7a_9e36_0f2d_7b8c_a113);

/// Insurance licensing exam category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "생보")]
    Life,
    #[serde(rename = "손보")]
    NonLife,
    #[serde(rename = "제3보험")]
    ThirdSector,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Life => "생보",
            ExamType::NonLife => "손보",
            ExamType::ThirdSector => "제3보험",
        }
    }

    /// Parses a label as written by the structuring endpoint or an admin.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "생보" | "생명보험" | "생명" | "life" => Some(ExamType::Life),
            "손보" | "손해보험" | "손해" | "non_life" => Some(ExamType::NonLife),
            "제3보험" | "제3" | "third_sector" => Some(ExamType::ThirdSector),
            _ => None,
        }
    }

    /// Keyword sniffing over free text. 제3 is checked first since third-sector
    /// notices often mention 생보/손보 as well.
    pub fn sniff(text: &str) -> Option<Self> {
        if text.contains("제3") {
            Some(ExamType::ThirdSector)
        } else if text.contains("손보") || text.contains("손해보험") {
            Some(ExamType::NonLife)
        } else if text.contains("생보") || text.contains("서보") || text.contains("생명보험") {
            Some(ExamType::Life)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ExamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    OfficialOnly,
    InternalOnly,
    Combined,
    /// Created directly through the admin UI; never produced by reconciliation.
    Manual,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::OfficialOnly => "official_only",
            DataSource::InternalOnly => "internal_only",
            DataSource::Combined => "combined",
            DataSource::Manual => "manual",
        }
    }

    pub fn from_str_opt(raw: &str) -> Option<Self> {
        match raw {
            "official_only" => Some(DataSource::OfficialOnly),
            "internal_only" => Some(DataSource::InternalOnly),
            "combined" => Some(DataSource::Combined),
            "manual" => Some(DataSource::Manual),
            _ => None,
        }
    }
}

/// One exam session as described by the official notice or crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialSession {
    pub year: i32,
    pub exam_type: ExamType,
    /// Absent for ungrouped crawl rows until the grouping pass numbers them.
    pub session_number: Option<u32>,
    pub registration_start: Option<NaiveDate>,
    pub registration_end: Option<NaiveDate>,
    pub exam_date: Option<NaiveDate>,
    #[serde(with = "hhmm")]
    pub exam_time_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub exam_time_end: NaiveTime,
    pub locations: BTreeSet<CityId>,
    pub notes: String,
}

/// The company's own application deadline covering one or more sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalDeadline {
    pub year: i32,
    pub exam_type: ExamType,
    pub session_range: String,
    /// Ascending, no duplicates.
    pub session_numbers: Vec<u32>,
    pub deadline_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub deadline_time: NaiveTime,
    pub notice_date: Option<NaiveDate>,
    #[serde(with = "option_hhmm")]
    pub notice_time: Option<NaiveTime>,
    pub notes: String,
}

impl InternalDeadline {
    pub fn covers(&self, exam_type: ExamType, session_number: u32) -> bool {
        self.exam_type == exam_type && self.session_numbers.contains(&session_number)
    }
}

/// The reconciled, persisted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSchedule {
    pub id: Uuid,
    pub year: i32,
    pub exam_type: ExamType,
    pub session_number: u32,
    pub session_range: Option<String>,
    pub registration_start: Option<NaiveDate>,
    pub registration_end: Option<NaiveDate>,
    pub exam_date: Option<NaiveDate>,
    #[serde(with = "option_hhmm")]
    pub exam_time_start: Option<NaiveTime>,
    #[serde(with = "option_hhmm")]
    pub exam_time_end: Option<NaiveTime>,
    pub locations: BTreeSet<CityId>,
    pub internal_deadline_date: Option<NaiveDate>,
    #[serde(with = "option_hhmm")]
    pub internal_deadline_time: Option<NaiveTime>,
    pub notice_date: Option<NaiveDate>,
    #[serde(with = "option_hhmm")]
    pub notice_time: Option<NaiveTime>,
    pub has_internal_deadline: bool,
    pub data_source: DataSource,
    pub notes: String,
    pub combined_notes: String,
}

impl CanonicalSchedule {
    pub fn deterministic_id(year: i32, exam_type: ExamType, session_number: u32) -> Uuid {
        let name = format!("{year}:{}:{session_number}", exam_type.as_str());
        Uuid::new_v5(&SCHEDULE_ID_NAMESPACE, name.as_bytes())
    }

    /// `(year, exam_type, session_number)`, unique within one reconciliation run.
    pub fn key(&self) -> (i32, ExamType, u32) {
        (self.year, self.exam_type, self.session_number)
    }
}

/// Joins note fragments with " | ", skipping empty parts.
pub fn join_notes<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Serializes `NaiveTime` as "HH:MM".
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, "%H:%M").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }
}

pub mod option_hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| super::hhmm::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_type_serde_uses_korean_labels() {
        assert_eq!(serde_json::to_string(&ExamType::Life).unwrap(), r#""생보""#);
        let parsed: ExamType = serde_json::from_str(r#""제3보험""#).unwrap();
        assert_eq!(parsed, ExamType::ThirdSector);
    }

    #[test]
    fn test_exam_type_sniff_keywords() {
        assert_eq!(ExamType::sniff("2025년 생보 자격시험"), Some(ExamType::Life));
        assert_eq!(ExamType::sniff("서보 시험 안내"), Some(ExamType::Life));
        assert_eq!(ExamType::sniff("손해보험 모집인"), Some(ExamType::NonLife));
        assert_eq!(ExamType::sniff("제3보험 시험"), Some(ExamType::ThirdSector));
        assert_eq!(ExamType::sniff("시험 일정"), None);
    }

    #[test]
    fn test_deterministic_id_is_stable_and_distinct() {
        let a = CanonicalSchedule::deterministic_id(2025, ExamType::Life, 1);
        let b = CanonicalSchedule::deterministic_id(2025, ExamType::Life, 1);
        let c = CanonicalSchedule::deterministic_id(2025, ExamType::NonLife, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_join_notes_drops_empty_parts() {
        assert_eq!(join_notes(["공식", "", "  "]), "공식");
        assert_eq!(join_notes(["공식", "사내"]), "공식 | 사내");
        assert_eq!(join_notes(["", ""]), "");
    }

    #[test]
    fn test_time_fields_serialize_as_hh_mm() {
        let deadline = InternalDeadline {
            year: 2025,
            exam_type: ExamType::Life,
            session_range: "1차".to_string(),
            session_numbers: vec![1],
            deadline_date: NaiveDate::from_ymd_opt(2025, 11, 4).unwrap(),
            deadline_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            notice_date: None,
            notice_time: None,
            notes: String::new(),
        };
        let json = serde_json::to_value(&deadline).unwrap();
        assert_eq!(json["deadline_time"], "11:00");
        assert!(json["notice_time"].is_null());
        let back: InternalDeadline = serde_json::from_value(json).unwrap();
        assert_eq!(back, deadline);
    }
}

//! Status Evaluator. Computed on read from the current KST wall clock; never
//! persisted.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::schedule::types::CanonicalSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    InternalOpen,
    InternalClosed,
    NoSchedule,
    Upcoming,
    Open,
    Closed,
}

impl ScheduleStatus {
    /// Statuses under which a new applicant can still register.
    pub fn accepts_applications(&self) -> bool {
        matches!(self, ScheduleStatus::InternalOpen | ScheduleStatus::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub code: ScheduleStatus,
    pub label: &'static str,
}

impl StatusView {
    fn new(code: ScheduleStatus, label: &'static str) -> Self {
        Self { code, label }
    }
}

/// Current wall-clock time in Korea Standard Time (UTC+9, no DST).
pub fn kst_now() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(9)
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// First matching rule wins: internal deadline, then missing registration
/// window, then the registration window itself.
pub fn status(record: &CanonicalSchedule, now: NaiveDateTime) -> StatusView {
    if let (true, Some(date)) = (record.has_internal_deadline, record.internal_deadline_date) {
        let deadline = date.and_time(record.internal_deadline_time.unwrap_or_else(end_of_day));
        return if now >= deadline {
            StatusView::new(ScheduleStatus::InternalClosed, "사내 마감")
        } else if now.date() == date {
            StatusView::new(ScheduleStatus::InternalOpen, "마감 당일")
        } else {
            StatusView::new(ScheduleStatus::InternalOpen, "사내 접수중")
        };
    }

    let today = now.date();
    match (record.registration_start, record.registration_end) {
        (None, None) => StatusView::new(ScheduleStatus::NoSchedule, "일정 미정"),
        (Some(start), _) if today < start => StatusView::new(ScheduleStatus::Upcoming, "접수 예정"),
        (_, Some(end)) if today > end => StatusView::new(ScheduleStatus::Closed, "접수 마감"),
        _ => StatusView::new(ScheduleStatus::Open, "접수중"),
    }
}

/// Calendar-day difference between `deadline` and `today`, rendered for the UI.
pub fn days_until(deadline: NaiveDate, today: NaiveDate) -> String {
    let days = deadline.signed_duration_since(today).num_days();
    match days {
        n if n > 0 => format!("{n}일 남음"),
        0 => "오늘 마감".to_string(),
        _ => "마감됨".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::{DataSource, ExamType};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn record() -> CanonicalSchedule {
        CanonicalSchedule {
            id: CanonicalSchedule::deterministic_id(2025, ExamType::Life, 1),
            year: 2025,
            exam_type: ExamType::Life,
            session_number: 1,
            session_range: None,
            registration_start: None,
            registration_end: None,
            exam_date: Some(d(11, 10)),
            exam_time_start: None,
            exam_time_end: None,
            locations: Default::default(),
            internal_deadline_date: None,
            internal_deadline_time: None,
            notice_date: None,
            notice_time: None,
            has_internal_deadline: false,
            data_source: DataSource::OfficialOnly,
            notes: String::new(),
            combined_notes: String::new(),
        }
    }

    fn with_deadline(date: NaiveDate, time: Option<NaiveTime>) -> CanonicalSchedule {
        CanonicalSchedule {
            internal_deadline_date: Some(date),
            internal_deadline_time: time,
            has_internal_deadline: true,
            data_source: DataSource::InternalOnly,
            ..record()
        }
    }

    #[test]
    fn test_deadline_day_without_time_is_last_day_warning() {
        let today = d(11, 4);
        let r = with_deadline(today, None);
        let view = status(&r, at(today, 23, 0));
        assert_eq!(view.code, ScheduleStatus::InternalOpen);
        assert_eq!(view.label, "마감 당일");
    }

    #[test]
    fn test_after_midnight_deadline_is_closed() {
        let r = with_deadline(d(11, 4), None);
        let view = status(&r, at(d(11, 5), 0, 1));
        assert_eq!(view.code, ScheduleStatus::InternalClosed);
    }

    #[test]
    fn test_deadline_time_respected_on_the_day() {
        let r = with_deadline(d(11, 4), NaiveTime::from_hms_opt(11, 0, 0));
        assert_eq!(status(&r, at(d(11, 4), 10, 59)).label, "마감 당일");
        assert_eq!(status(&r, at(d(11, 4), 11, 0)).code, ScheduleStatus::InternalClosed);
        assert_eq!(status(&r, at(d(11, 1), 9, 0)).label, "사내 접수중");
    }

    #[test]
    fn test_internal_deadline_outranks_registration_window() {
        let mut r = with_deadline(d(11, 4), None);
        r.registration_start = Some(d(10, 1));
        r.registration_end = Some(d(10, 5));
        assert_eq!(status(&r, at(d(10, 3), 12, 0)).code, ScheduleStatus::InternalOpen);
    }

    #[test]
    fn test_registration_window_classification() {
        let mut r = record();
        assert_eq!(status(&r, at(d(10, 1), 0, 0)).code, ScheduleStatus::NoSchedule);

        r.registration_start = Some(d(10, 1));
        r.registration_end = Some(d(10, 5));
        assert_eq!(status(&r, at(d(9, 30), 23, 59)).code, ScheduleStatus::Upcoming);
        assert_eq!(status(&r, at(d(10, 1), 0, 0)).code, ScheduleStatus::Open);
        assert_eq!(status(&r, at(d(10, 5), 23, 59)).code, ScheduleStatus::Open);
        assert_eq!(status(&r, at(d(10, 6), 0, 0)).code, ScheduleStatus::Closed);
    }

    #[test]
    fn test_half_open_registration_window() {
        let mut r = record();
        r.registration_end = Some(d(10, 5));
        assert_eq!(status(&r, at(d(9, 1), 0, 0)).code, ScheduleStatus::Open);
        assert_eq!(status(&r, at(d(10, 6), 0, 0)).code, ScheduleStatus::Closed);

        let mut r = record();
        r.registration_start = Some(d(10, 1));
        assert_eq!(status(&r, at(d(9, 30), 0, 0)).code, ScheduleStatus::Upcoming);
        assert_eq!(status(&r, at(d(12, 31), 0, 0)).code, ScheduleStatus::Open);
    }

    #[test]
    fn test_days_until_uses_calendar_days() {
        let today = d(11, 4);
        assert_eq!(days_until(d(11, 7), today), "3일 남음");
        assert_eq!(days_until(today, today), "오늘 마감");
        assert_eq!(days_until(d(11, 3), today), "마감됨");
    }

    #[test]
    fn test_open_statuses() {
        assert!(ScheduleStatus::InternalOpen.accepts_applications());
        assert!(ScheduleStatus::Open.accepts_applications());
        assert!(!ScheduleStatus::Upcoming.accepts_applications());
        assert!(!ScheduleStatus::InternalClosed.accepts_applications());
    }
}

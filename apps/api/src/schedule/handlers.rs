use std::future::Future;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::schedule::archive::try_archive_notice;
use crate::schedule::demo::{demo_official, DemoFallbackLog};
use crate::schedule::error::ExtractionError;
use crate::schedule::grouping::{assign_sessions, GroupingOutcome};
use crate::schedule::internal::extract_internal;
use crate::schedule::locations;
use crate::schedule::official::{extract_official, official_from_crawl_rows, ExtractionOutcome};
use crate::schedule::prompts::{NOTICE_OCR_INSTRUCTION, NOTICE_OCR_SYSTEM};
use crate::schedule::reconcile::reconcile;
use crate::schedule::status::{days_until, kst_now, status, StatusView};
use crate::schedule::store::{self, SaveResult};
use crate::schedule::structurer::ExtractionHint;
use crate::schedule::types::{CanonicalSchedule, ExamType, InternalDeadline, OfficialSession};
use crate::state::AppState;

// ──────────────────────────────────────────────
// Request / response types
// ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub total_schedules: usize,
    pub official_schedules: usize,
    pub internal_deadlines: usize,
    pub demo_fallbacks: u32,
    /// Which paths ("image", "text") answered with demo data.
    pub demo_fallback_paths: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathFailure {
    pub path: &'static str,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractData {
    pub extracted_image_text: Option<String>,
    pub provided_text: Option<String>,
    pub image_schedules: Vec<OfficialSession>,
    /// Image rows that could not be given a session number.
    pub unassignable: Vec<OfficialSession>,
    pub text_schedules: Vec<InternalDeadline>,
    pub combined_schedules: Vec<CanonicalSchedule>,
    pub summary: ExtractionSummary,
    pub archived_image_key: Option<String>,
    pub partial_failures: Vec<PathFailure>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub data: ExtractData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCrawlRequest {
    pub year: i32,
    pub exam_type: String,
    pub internal_text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCrawlData {
    pub crawled_rows: usize,
    pub sessions: Vec<OfficialSession>,
    pub unassignable: Vec<OfficialSession>,
    pub internal_deadlines: Vec<InternalDeadline>,
    pub combined_schedules: Vec<CanonicalSchedule>,
    pub summary: ExtractionSummary,
    pub partial_failures: Vec<PathFailure>,
}

#[derive(Debug, Serialize)]
pub struct SmartCrawlResponse {
    pub success: bool,
    pub data: SmartCrawlData,
}

#[derive(Debug, Deserialize)]
pub struct BulkSaveRequest {
    pub schedules: Vec<CanonicalSchedule>,
}

#[derive(Debug, Serialize)]
pub struct BulkSaveResponse {
    pub success: bool,
    pub saved: usize,
    pub failed: usize,
    pub results: Vec<SaveResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub year: Option<i32>,
    pub exam_type: Option<String>,
}

/// A persisted record plus everything derived from the clock at read time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: CanonicalSchedule,
    pub status: StatusView,
    pub days_until: Option<String>,
    pub locations_display: String,
}

impl ScheduleView {
    pub fn at(schedule: CanonicalSchedule, now: NaiveDateTime) -> Self {
        let deadline = schedule.internal_deadline_date.or(schedule.registration_end);
        Self {
            status: status(&schedule, now),
            days_until: deadline.map(|d| days_until(d, now.date())),
            locations_display: locations::display(&schedule.locations),
            schedule,
        }
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn parse_exam_type(raw: &str) -> Result<ExamType, AppError> {
    ExamType::from_label(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown examType '{raw}' (expected 생보, 손보 or 제3보험)")))
}

async fn with_timeout<T>(
    secs: u64,
    fut: impl Future<Output = Result<T, ExtractionError>>,
) -> Result<T, ExtractionError> {
    tokio::time::timeout(Duration::from_secs(secs), fut)
        .await
        .map_err(|_| ExtractionError::Timeout(secs))?
}

/// Logs a failed path and records it for the response. Partial failures are
/// never surfaced as a top-level error.
fn absorb<T>(
    path: &'static str,
    result: Option<Result<ExtractionOutcome<T>, ExtractionError>>,
    demo: &mut DemoFallbackLog,
    failures: &mut Vec<PathFailure>,
) -> Vec<T> {
    match result {
        None => Vec::new(),
        Some(Ok(outcome)) => {
            if outcome.demo_fallback {
                demo.record(path);
            }
            outcome.records
        }
        Some(Err(e)) => {
            warn!("ExtractionPartialFailure on {path} path: {e}");
            failures.push(PathFailure {
                path,
                code: e.code(),
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}

/// OCR output rarely states session numbers for every regional row. Number
/// by date only when none are present; mixing would collide with stated ones,
/// so unnumbered rows next to numbered ones are reported as unassignable.
fn number_sessions(officials: Vec<OfficialSession>) -> GroupingOutcome {
    if officials.iter().any(|o| o.session_number.is_some()) {
        let (sessions, unassignable): (Vec<_>, Vec<_>) =
            officials.into_iter().partition(|o| o.session_number.is_some());
        if !unassignable.is_empty() {
            warn!("{} image rows have no session number next to numbered ones", unassignable.len());
        }
        return GroupingOutcome { sessions, unassignable };
    }
    assign_sessions(officials)
}

fn summary(
    combined: &[CanonicalSchedule],
    officials: usize,
    internals: usize,
    demo: &DemoFallbackLog,
) -> ExtractionSummary {
    ExtractionSummary {
        total_schedules: combined.len(),
        official_schedules: officials,
        internal_deadlines: internals,
        demo_fallbacks: demo.count,
        demo_fallback_paths: demo.paths.clone(),
    }
}

struct NoticeImage {
    bytes: Bytes,
    content_type: String,
}

#[derive(Default)]
struct ExtractForm {
    image: Option<NoticeImage>,
    text: Option<String>,
    year: Option<i32>,
    exam_type: Option<ExamType>,
}

async fn read_extract_form(mut multipart: Multipart) -> Result<ExtractForm, AppError> {
    let mut form = ExtractForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().unwrap_or("image/jpeg").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable image: {e}")))?;
                if !bytes.is_empty() {
                    form.image = Some(NoticeImage {
                        bytes,
                        content_type,
                    });
                }
            }
            "text" | "year" | "examType" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable field '{name}': {e}")))?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "text" => form.text = Some(value),
                    "year" => {
                        form.year = Some(value.parse().map_err(|_| {
                            AppError::Validation(format!("year must be a number, got '{value}'"))
                        })?)
                    }
                    _ => form.exam_type = Some(parse_exam_type(&value)?),
                }
            }
            other => warn!("Ignoring unexpected multipart field '{other}'"),
        }
    }
    Ok(form)
}

// ──────────────────────────────────────────────
// Handlers
// ──────────────────────────────────────────────

/// POST /api/v1/exam-schedules/extract
///
/// Combined submission: an official notice image and/or the internal deadline
/// memo. Either path may fail on its own; only a missing input or a failure
/// of every submitted path fails the request.
pub async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let form = read_extract_form(multipart).await?;
    if form.image.is_none() && form.text.is_none() {
        return Err(AppError::Validation(
            "Provide a notice image, internal text, or both".to_string(),
        ));
    }

    let now = kst_now();
    let today = now.date();
    let hint = ExtractionHint {
        year: form.year.unwrap_or_else(|| today.year()),
        exam_type: form.exam_type,
    };
    let timeout_secs = state.config.extraction_timeout_secs;
    let structurer = state.structurer.as_ref();
    let mut demo = DemoFallbackLog::default();
    let mut failures = Vec::new();

    let archived_image_key = match &form.image {
        Some(image) => {
            try_archive_notice(&state.s3, &state.config.s3_bucket, image.bytes.clone(), &image.content_type)
                .await
        }
        None => None,
    };

    // OCR must finish before the official path can start.
    let mut ocr_quota_demo: Option<OfficialSession> = None;
    let extracted_image_text = match &form.image {
        Some(image) => {
            let ocr = with_timeout(timeout_secs, async {
                state
                    .llm
                    .extract_image_text(&image.bytes, &image.content_type, NOTICE_OCR_SYSTEM, NOTICE_OCR_INSTRUCTION)
                    .await
                    .map_err(ExtractionError::from)
            })
            .await;
            match ocr {
                Ok(text) => {
                    info!("OCR extracted {} characters from notice image", text.chars().count());
                    Some(text)
                }
                Err(ExtractionError::UpstreamQuota(reason)) => {
                    warn!("OCR quota exhausted ({reason}); using demo session");
                    ocr_quota_demo = Some(demo_official("", &hint, today));
                    None
                }
                Err(e) => {
                    warn!("ExtractionPartialFailure on image path (OCR): {e}");
                    failures.push(PathFailure {
                        path: "image",
                        code: e.code(),
                        message: e.to_string(),
                    });
                    None
                }
            }
        }
        None => None,
    };

    let official_task = async {
        match extracted_image_text.as_deref() {
            Some(text) => Some(with_timeout(timeout_secs, extract_official(structurer, text, &hint, today)).await),
            None => None,
        }
    };
    let internal_task = async {
        match form.text.as_deref() {
            Some(text) => Some(with_timeout(timeout_secs, extract_internal(structurer, text, &hint, today)).await),
            None => None,
        }
    };
    let (official_result, internal_result) = tokio::join!(official_task, internal_task);

    let mut officials = absorb("image", official_result, &mut demo, &mut failures);
    if let Some(session) = ocr_quota_demo {
        demo.record("image");
        officials.push(session);
    }
    let internals = absorb("text", internal_result, &mut demo, &mut failures);

    let attempted = usize::from(form.image.is_some()) + usize::from(form.text.is_some());
    if failures.len() == attempted {
        let details = failures
            .iter()
            .map(|f| format!("{}: {}", f.path, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::ExtractionFailed {
            message: "Schedule extraction failed".to_string(),
            details,
        });
    }

    let GroupingOutcome {
        sessions: officials,
        unassignable,
    } = number_sessions(officials);
    let combined = reconcile(&officials, &internals);
    info!(
        "Extract: {} official ({} unassignable), {} internal → {} schedules ({} demo fallbacks)",
        officials.len(),
        unassignable.len(),
        internals.len(),
        combined.len(),
        demo.count
    );

    let summary = summary(&combined, officials.len(), internals.len(), &demo);
    Ok(Json(ExtractResponse {
        success: true,
        data: ExtractData {
            extracted_image_text,
            provided_text: form.text,
            image_schedules: officials,
            unassignable,
            text_schedules: internals,
            combined_schedules: combined,
            summary,
            archived_image_key,
            partial_failures: failures,
        },
    }))
}

/// POST /api/v1/exam-schedules/smart-crawl
pub async fn handle_smart_crawl(
    State(state): State<AppState>,
    Json(req): Json<SmartCrawlRequest>,
) -> Result<Json<SmartCrawlResponse>, AppError> {
    let exam_type = parse_exam_type(&req.exam_type)?;
    let today = kst_now().date();
    let hint = ExtractionHint {
        year: req.year,
        exam_type: Some(exam_type),
    };

    let rows = state.crawl.fetch_rows(req.year, exam_type).await?;
    let grouping = assign_sessions(official_from_crawl_rows(&rows, req.year, exam_type));

    let mut demo = DemoFallbackLog::default();
    let mut failures = Vec::new();
    let internal_result = match req.internal_text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => Some(
            with_timeout(
                state.config.extraction_timeout_secs,
                extract_internal(state.structurer.as_ref(), text, &hint, today),
            )
            .await,
        ),
        None => None,
    };
    let internals = absorb("text", internal_result, &mut demo, &mut failures);

    let combined = reconcile(&grouping.sessions, &internals);
    info!(
        "Smart crawl {} {exam_type}: {} rows → {} sessions, {} unassignable",
        req.year,
        rows.len(),
        grouping.sessions.len(),
        grouping.unassignable.len()
    );

    let summary = summary(&combined, grouping.sessions.len(), internals.len(), &demo);
    Ok(Json(SmartCrawlResponse {
        success: true,
        data: SmartCrawlData {
            crawled_rows: rows.len(),
            sessions: grouping.sessions,
            unassignable: grouping.unassignable,
            internal_deadlines: internals,
            combined_schedules: combined,
            summary,
            partial_failures: failures,
        },
    }))
}

/// POST /api/v1/exam-schedules/bulk-save
pub async fn handle_bulk_save(
    State(state): State<AppState>,
    Json(req): Json<BulkSaveRequest>,
) -> Result<Json<BulkSaveResponse>, AppError> {
    if req.schedules.is_empty() {
        return Err(AppError::Validation("No schedules to save".to_string()));
    }
    let duplicates = store::duplicate_keys(&req.schedules);
    if !duplicates.is_empty() {
        let listed = duplicates
            .iter()
            .map(|(year, exam_type, n)| format!("{year} {exam_type} {n}차"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(AppError::Validation(format!("Duplicate sessions in batch: {listed}")));
    }

    let results = store::upsert_schedules(&state.db, &req.schedules).await;
    let saved = results.iter().filter(|r| r.saved).count();
    let failed = results.len() - saved;
    Ok(Json(BulkSaveResponse {
        success: failed == 0,
        saved,
        failed,
        results,
    }))
}

/// GET /api/v1/exam-schedules
pub async fn handle_list_schedules(
    State(state): State<AppState>,
    Query(params): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleView>>, AppError> {
    let exam_type = params.exam_type.as_deref().map(parse_exam_type).transpose()?;
    let schedules = store::list_schedules(&state.db, params.year, exam_type).await?;
    let now = kst_now();
    Ok(Json(schedules.into_iter().map(|s| ScheduleView::at(s, now)).collect()))
}

/// GET /api/v1/exam-schedules/open
pub async fn handle_open_schedules(
    State(state): State<AppState>,
    Query(params): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleView>>, AppError> {
    let exam_type = params.exam_type.as_deref().map(parse_exam_type).transpose()?;
    let schedules = store::list_schedules(&state.db, params.year, exam_type).await?;
    let now = kst_now();
    Ok(Json(open_views(schedules, now)))
}

fn open_views(schedules: Vec<CanonicalSchedule>, now: NaiveDateTime) -> Vec<ScheduleView> {
    schedules
        .into_iter()
        .map(|s| ScheduleView::at(s, now))
        .filter(|v| v.status.code.accepts_applications())
        .collect()
}

/// GET /api/v1/exam-schedules/:id
pub async fn handle_get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduleView>, AppError> {
    let schedule = store::get_schedule(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Exam schedule {id} not found")))?;
    Ok(Json(ScheduleView::at(schedule, kst_now())))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::schedule::locations::{expand_group, CityId};
    use crate::schedule::status::ScheduleStatus;
    use crate::schedule::types::DataSource;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn official(date: Option<NaiveDate>, n: Option<u32>, group: &str) -> OfficialSession {
        OfficialSession {
            year: 2025,
            exam_type: ExamType::Life,
            session_number: n,
            registration_start: None,
            registration_end: None,
            exam_date: date,
            exam_time_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            exam_time_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            locations: expand_group(group),
            notes: String::new(),
        }
    }

    fn internal_only(n: u32, deadline: NaiveDate) -> CanonicalSchedule {
        CanonicalSchedule {
            id: CanonicalSchedule::deterministic_id(2025, ExamType::Life, n),
            year: 2025,
            exam_type: ExamType::Life,
            session_number: n,
            session_range: Some("1~4차".to_string()),
            registration_start: None,
            registration_end: None,
            exam_date: None,
            exam_time_start: None,
            exam_time_end: None,
            locations: expand_group("수도권"),
            internal_deadline_date: Some(deadline),
            internal_deadline_time: None,
            notice_date: None,
            notice_time: None,
            has_internal_deadline: true,
            data_source: DataSource::InternalOnly,
            notes: String::new(),
            combined_notes: String::new(),
        }
    }

    #[test]
    fn test_schedule_view_derives_read_time_fields() {
        let now = d(11, 1).and_hms_opt(9, 0, 0).unwrap();
        let view = ScheduleView::at(internal_only(1, d(11, 4)), now);
        assert_eq!(view.status.code, ScheduleStatus::InternalOpen);
        assert_eq!(view.days_until.as_deref(), Some("3일 남음"));
        assert_eq!(view.locations_display, "수도권(서울, 인천, 제주)");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["session_number"], 1);
        assert_eq!(json["status"]["code"], "internal_open");
        assert_eq!(json["locationsDisplay"], "수도권(서울, 인천, 제주)");
    }

    #[test]
    fn test_open_views_keep_only_registrable_records() {
        let now = d(11, 5).and_hms_opt(12, 0, 0).unwrap();
        let views = open_views(vec![internal_only(1, d(11, 4)), internal_only(2, d(11, 6))], now);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].schedule.session_number, 2);
    }

    #[test]
    fn test_number_sessions_only_when_all_unnumbered() {
        let unnumbered = vec![
            official(Some(d(11, 17)), None, "대구"),
            official(Some(d(11, 10)), None, "수도권"),
        ];
        let numbered = number_sessions(unnumbered).sessions;
        assert_eq!(numbered[0].session_number, Some(1));
        assert_eq!(numbered[0].exam_date, Some(d(11, 10)));

        let mixed = vec![official(Some(d(11, 10)), Some(3), "수도권"), official(None, None, "영남")];
        let kept = number_sessions(mixed);
        assert_eq!(kept.sessions.len(), 1);
        assert_eq!(kept.sessions[0].session_number, Some(3));
        assert_eq!(kept.unassignable.len(), 1);
    }

    #[test]
    fn test_undated_image_row_is_reported_unassignable() {
        let rows = vec![
            official(Some(d(11, 10)), None, "수도권"),
            official(None, None, "영남"),
        ];
        let outcome = number_sessions(rows);
        assert_eq!(outcome.sessions.len(), 1);
        assert_eq!(outcome.sessions[0].session_number, Some(1));
        assert_eq!(outcome.unassignable.len(), 1);
        assert_eq!(outcome.unassignable[0].exam_date, None);
        assert_eq!(outcome.unassignable[0].locations, expand_group("영남"));
    }

    #[test]
    fn test_absorb_records_failures_and_demo_paths() {
        let mut demo = DemoFallbackLog::default();
        let mut failures = Vec::new();

        let ok: Option<Result<ExtractionOutcome<u32>, ExtractionError>> =
            Some(Ok(ExtractionOutcome { records: vec![1, 2], demo_fallback: true }));
        assert_eq!(absorb("text", ok, &mut demo, &mut failures), vec![1, 2]);
        assert_eq!(demo.count, 1);

        let json = serde_json::to_value(summary(&[], 0, 2, &demo)).unwrap();
        assert_eq!(json["demoFallbacks"], 1);
        assert_eq!(json["demoFallbackPaths"], serde_json::json!(["text"]));

        let failed: Option<Result<ExtractionOutcome<u32>, ExtractionError>> =
            Some(Err(ExtractionError::UpstreamRateLimit("slow down".into())));
        assert!(absorb("image", failed, &mut demo, &mut failures).is_empty());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, "UPSTREAM_RATE_LIMIT");

        assert!(absorb::<u32>("image", None, &mut demo, &mut failures).is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_rule_based_extraction_and_reconcile() {
        let locations_expected = [CityId::Seoul, CityId::Incheon, CityId::Jeju, CityId::Busan, CityId::Ulsan];
        let hint = ExtractionHint { year: 2025, exam_type: Some(ExamType::Life) };
        let today = d(10, 1);
        let structurer = crate::schedule::structurer::RuleStructurer;

        let officials = extract_official(&structurer, "수도권 1차 11월 10일, 영남 1차 11월 10일", &hint, today)
            .await
            .unwrap()
            .records;
        let internals = extract_internal(&structurer, "1~4차 시험접수마감: 11월 4일(화) 오전 11시", &hint, today)
            .await
            .unwrap()
            .records;

        let combined = reconcile(&number_sessions(officials).sessions, &internals);
        let first = &combined[0];
        assert_eq!(first.session_number, 1);
        assert_eq!(first.data_source, DataSource::Combined);
        assert_eq!(first.exam_date, Some(d(11, 10)));
        assert_eq!(first.locations, locations_expected.into_iter().collect());
        assert_eq!(first.internal_deadline_date, Some(d(11, 4)));
        assert_eq!(first.internal_deadline_time, NaiveTime::from_hms_opt(11, 0, 0));
        assert_eq!(combined.len(), 4);
        assert!(combined[1..].iter().all(|s| s.data_source == DataSource::InternalOnly));
    }
}

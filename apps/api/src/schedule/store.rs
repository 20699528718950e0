use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::schedule::ExamScheduleRow;
use crate::schedule::types::{CanonicalSchedule, ExamType};

/// Per-record outcome of a bulk upsert. Persistence is not transactional, so
/// callers get one of these for every input record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub id: Uuid,
    pub session_number: u32,
    pub exam_type: ExamType,
    pub saved: bool,
    pub error: Option<String>,
}

/// Keys that occur more than once in `schedules`. Empty means the batch is
/// safe to upsert.
pub fn duplicate_keys(schedules: &[CanonicalSchedule]) -> Vec<(i32, ExamType, u32)> {
    let mut seen: BTreeMap<(i32, ExamType, u32), usize> = BTreeMap::new();
    for schedule in schedules {
        *seen.entry(schedule.key()).or_default() += 1;
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key)
        .collect()
}

/// Stored ids always derive from the record key, whatever id the client sent.
pub fn canonical_id(schedule: &CanonicalSchedule) -> Uuid {
    CanonicalSchedule::deterministic_id(schedule.year, schedule.exam_type, schedule.session_number)
}

fn session_number_column(n: u32) -> Result<i32, String> {
    i32::try_from(n).map_err(|_| format!("session number {n} is out of range"))
}

async fn upsert_one(
    pool: &PgPool,
    id: Uuid,
    session_number: i32,
    s: &CanonicalSchedule,
) -> Result<(), sqlx::Error> {
    let locations: Vec<String> = s.locations.iter().map(|c| c.name().to_string()).collect();
    sqlx::query(
        r#"
        INSERT INTO exam_schedules
            (id, year, exam_type, session_number, session_range,
             registration_start, registration_end, exam_date, exam_time_start, exam_time_end,
             locations, internal_deadline_date, internal_deadline_time, notice_date, notice_time,
             has_internal_deadline, data_source, notes, combined_notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        ON CONFLICT (id) DO UPDATE SET
            session_range = EXCLUDED.session_range,
            registration_start = EXCLUDED.registration_start,
            registration_end = EXCLUDED.registration_end,
            exam_date = EXCLUDED.exam_date,
            exam_time_start = EXCLUDED.exam_time_start,
            exam_time_end = EXCLUDED.exam_time_end,
            locations = EXCLUDED.locations,
            internal_deadline_date = EXCLUDED.internal_deadline_date,
            internal_deadline_time = EXCLUDED.internal_deadline_time,
            notice_date = EXCLUDED.notice_date,
            notice_time = EXCLUDED.notice_time,
            has_internal_deadline = EXCLUDED.has_internal_deadline,
            data_source = EXCLUDED.data_source,
            notes = EXCLUDED.notes,
            combined_notes = EXCLUDED.combined_notes,
            updated_at = NOW()
        "#,
    )
    .bind(id)
    .bind(s.year)
    .bind(s.exam_type.as_str())
    .bind(session_number)
    .bind(&s.session_range)
    .bind(s.registration_start)
    .bind(s.registration_end)
    .bind(s.exam_date)
    .bind(s.exam_time_start)
    .bind(s.exam_time_end)
    .bind(&locations)
    .bind(s.internal_deadline_date)
    .bind(s.internal_deadline_time)
    .bind(s.notice_date)
    .bind(s.notice_time)
    .bind(s.internal_deadline_date.is_some())
    .bind(s.data_source.as_str())
    .bind(&s.notes)
    .bind(&s.combined_notes)
    .execute(pool)
    .await?;
    Ok(())
}

/// Upserts each record independently; one failure does not stop the rest.
pub async fn upsert_schedules(pool: &PgPool, schedules: &[CanonicalSchedule]) -> Vec<SaveResult> {
    let mut results = Vec::with_capacity(schedules.len());
    for schedule in schedules {
        let id = canonical_id(schedule);
        if id != schedule.id {
            warn!(
                "Replacing client id {} with {id} for {} {} session {}",
                schedule.id, schedule.year, schedule.exam_type, schedule.session_number
            );
        }
        let outcome = match session_number_column(schedule.session_number) {
            Ok(n) => upsert_one(pool, id, n, schedule).await.map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            warn!(
                "Failed to save {} session {} ({id}): {e}",
                schedule.exam_type, schedule.session_number
            );
        }
        results.push(SaveResult {
            id,
            session_number: schedule.session_number,
            exam_type: schedule.exam_type,
            saved: outcome.is_ok(),
            error: outcome.err(),
        });
    }
    let saved = results.iter().filter(|r| r.saved).count();
    info!("Saved {saved}/{} exam schedules", results.len());
    results
}

fn into_schedules(rows: Vec<ExamScheduleRow>) -> Vec<CanonicalSchedule> {
    rows.into_iter()
        .filter_map(|row| match CanonicalSchedule::try_from(row) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!("Skipping unreadable exam schedule row: {e}");
                None
            }
        })
        .collect()
}

pub async fn list_schedules(
    pool: &PgPool,
    year: Option<i32>,
    exam_type: Option<ExamType>,
) -> Result<Vec<CanonicalSchedule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExamScheduleRow>(
        r#"
        SELECT *
        FROM exam_schedules
        WHERE ($1::INTEGER IS NULL OR year = $1)
          AND ($2::TEXT IS NULL OR exam_type = $2)
        ORDER BY year, exam_type, session_number
        "#,
    )
    .bind(year)
    .bind(exam_type.map(|t| t.as_str()))
    .fetch_all(pool)
    .await?;
    Ok(into_schedules(rows))
}

pub async fn get_schedule(pool: &PgPool, id: Uuid) -> Result<Option<CanonicalSchedule>, sqlx::Error> {
    let row = sqlx::query_as::<_, ExamScheduleRow>("SELECT * FROM exam_schedules WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(CanonicalSchedule::try_from)
        .transpose()
        .map_err(|e| sqlx::Error::Decode(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::DataSource;

    fn schedule(exam_type: ExamType, n: u32) -> CanonicalSchedule {
        CanonicalSchedule {
            id: CanonicalSchedule::deterministic_id(2025, exam_type, n),
            year: 2025,
            exam_type,
            session_number: n,
            session_range: None,
            registration_start: None,
            registration_end: None,
            exam_date: None,
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

    #[test]
    fn test_duplicate_keys_detects_repeats_only() {
        let batch = vec![
            schedule(ExamType::Life, 1),
            schedule(ExamType::Life, 2),
            schedule(ExamType::NonLife, 1),
            schedule(ExamType::Life, 1),
        ];
        assert_eq!(duplicate_keys(&batch), vec![(2025, ExamType::Life, 1)]);
        assert!(duplicate_keys(&batch[..3]).is_empty());
    }

    #[test]
    fn test_canonical_id_ignores_client_id() {
        let mut edited = schedule(ExamType::Life, 3);
        let expected = edited.id;
        edited.id = Uuid::nil();
        assert_eq!(canonical_id(&edited), expected);

        edited.year = 2026;
        assert_eq!(canonical_id(&edited), CanonicalSchedule::deterministic_id(2026, ExamType::Life, 3));
        assert_ne!(canonical_id(&edited), expected);
    }

    #[test]
    fn test_session_number_column_rejects_overflow() {
        assert_eq!(session_number_column(12), Ok(12));
        assert_eq!(session_number_column(i32::MAX as u32), Ok(i32::MAX));
        assert!(session_number_column(i32::MAX as u32 + 1).is_err());
        assert!(session_number_column(u32::MAX).is_err());
    }
}

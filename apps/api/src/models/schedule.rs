use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::schedule::locations::CityId;
use crate::schedule::types::{CanonicalSchedule, DataSource, ExamType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamScheduleRow {
    pub id: Uuid,
    pub year: i32,
    pub exam_type: String,
    pub session_number: i32,
    pub session_range: Option<String>,
    pub registration_start: Option<NaiveDate>,
    pub registration_end: Option<NaiveDate>,
    pub exam_date: Option<NaiveDate>,
    pub exam_time_start: Option<NaiveTime>,
    pub exam_time_end: Option<NaiveTime>,
    pub locations: Vec<String>,
    pub internal_deadline_date: Option<NaiveDate>,
    pub internal_deadline_time: Option<NaiveTime>,
    pub notice_date: Option<NaiveDate>,
    pub notice_time: Option<NaiveTime>,
    pub has_internal_deadline: bool,
    pub data_source: String,
    pub notes: String,
    pub combined_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ExamScheduleRow> for CanonicalSchedule {
    type Error = anyhow::Error;

    fn try_from(row: ExamScheduleRow) -> Result<Self> {
        let exam_type = ExamType::from_label(&row.exam_type)
            .ok_or_else(|| anyhow!("row {} has unknown exam_type '{}'", row.id, row.exam_type))?;
        let data_source = DataSource::from_str_opt(&row.data_source)
            .ok_or_else(|| anyhow!("row {} has unknown data_source '{}'", row.id, row.data_source))?;
        let session_number = u32::try_from(row.session_number)
            .map_err(|_| anyhow!("row {} has negative session_number", row.id))?;

        Ok(CanonicalSchedule {
            id: row.id,
            year: row.year,
            exam_type,
            session_number,
            session_range: row.session_range,
            registration_start: row.registration_start,
            registration_end: row.registration_end,
            exam_date: row.exam_date,
            exam_time_start: row.exam_time_start,
            exam_time_end: row.exam_time_end,
            // Stored names are always canonical; anything else was hand-edited.
            locations: row.locations.iter().filter_map(|n| CityId::from_name(n)).collect(),
            internal_deadline_date: row.internal_deadline_date,
            internal_deadline_time: row.internal_deadline_time,
            notice_date: row.notice_date,
            notice_time: row.notice_time,
            has_internal_deadline: row.internal_deadline_date.is_some(),
            data_source,
            notes: row.notes,
            combined_notes: row.combined_notes,
        })
    }
}

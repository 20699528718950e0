//! Grouping Assigner — numbers ungrouped crawl rows by exam date.
//!
//! Rows are sorted by `exam_date`; every distinct date (per exam type) gets
//! the next session number, and rows sharing a date collapse into one
//! session whose locations are the union of theirs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::schedule::types::{join_notes, ExamType, OfficialSession};

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupingOutcome {
    /// One session per `(exam_type, exam_date)`, numbered from 1 in date order.
    pub sessions: Vec<OfficialSession>,
    /// Rows without an exam date; they cannot be numbered.
    pub unassignable: Vec<OfficialSession>,
}

pub fn assign_sessions(raw_rows: Vec<OfficialSession>) -> GroupingOutcome {
    let (mut dated, unassignable): (Vec<_>, Vec<_>) =
        raw_rows.into_iter().partition(|row| row.exam_date.is_some());

    // Stable: rows sharing a date keep their input order for field precedence.
    dated.sort_by_key(|row| (row.exam_type, row.exam_date));

    let mut grouped: BTreeMap<(ExamType, NaiveDate), OfficialSession> = BTreeMap::new();
    let mut counters: BTreeMap<ExamType, u32> = BTreeMap::new();

    for row in dated {
        let Some(date) = row.exam_date else { continue };
        match grouped.get_mut(&(row.exam_type, date)) {
            Some(session) => {
                session.locations.extend(row.locations);
                session.registration_start = session.registration_start.or(row.registration_start);
                session.registration_end = session.registration_end.or(row.registration_end);
                if !row.notes.is_empty() && !session.notes.contains(&row.notes) {
                    session.notes = join_notes([session.notes.as_str(), row.notes.as_str()]);
                }
            }
            None => {
                let counter = counters.entry(row.exam_type).or_insert(0);
                *counter += 1;
                let session_number = *counter;
                grouped.insert(
                    (row.exam_type, date),
                    OfficialSession {
                        session_number: Some(session_number),
                        ..row
                    },
                );
            }
        }
    }

    if !unassignable.is_empty() {
        tracing::warn!("{} crawl rows have no exam date and were not numbered", unassignable.len());
    }

    GroupingOutcome {
        sessions: grouped.into_values().collect(),
        unassignable,
    }
}

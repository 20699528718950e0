//! Reconciler — merges official sessions and internal deadlines into
//! canonical schedule records.
//!
//! Official sessions are emitted first and are never suppressed. Internal
//! deadlines are then re-checked against what was emitted, and every session
//! number they cover that is still missing becomes an `internal_only` record.
//! A `(year, exam_type, session_number)` key is emitted at most once.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::schedule::types::{
    join_notes, CanonicalSchedule, DataSource, ExamType, InternalDeadline, OfficialSession,
};

type SessionKey = (i32, ExamType, u32);

/// Collapses officials that share `(year, exam_type, session_number)`, e.g.
/// one row per region for the same session. Locations are unioned; for scalar
/// fields the first non-null value wins.
fn merge_officials(officials: &[OfficialSession]) -> BTreeMap<SessionKey, OfficialSession> {
    let mut merged: BTreeMap<SessionKey, OfficialSession> = BTreeMap::new();
    for official in officials {
        let Some(n) = official.session_number else {
            warn!(
                "Official {} session on {:?} has no session number; run grouping first",
                official.exam_type, official.exam_date
            );
            continue;
        };
        match merged.get_mut(&(official.year, official.exam_type, n)) {
            Some(existing) => {
                existing.locations.extend(official.locations.iter().copied());
                existing.exam_date = existing.exam_date.or(official.exam_date);
                existing.registration_start = existing.registration_start.or(official.registration_start);
                existing.registration_end = existing.registration_end.or(official.registration_end);
                if !official.notes.is_empty() && !existing.notes.contains(&official.notes) {
                    existing.notes = join_notes([existing.notes.as_str(), official.notes.as_str()]);
                }
            }
            None => {
                merged.insert((official.year, official.exam_type, n), official.clone());
            }
        }
    }
    merged
}

fn from_official(
    key: SessionKey,
    official: &OfficialSession,
    internal: Option<&InternalDeadline>,
) -> CanonicalSchedule {
    let (year, exam_type, session_number) = key;
    CanonicalSchedule {
        id: CanonicalSchedule::deterministic_id(year, exam_type, session_number),
        year,
        exam_type,
        session_number,
        session_range: internal.map(|i| i.session_range.clone()),
        registration_start: official.registration_start,
        registration_end: official.registration_end,
        exam_date: official.exam_date,
        exam_time_start: Some(official.exam_time_start),
        exam_time_end: Some(official.exam_time_end),
        locations: official.locations.clone(),
        internal_deadline_date: internal.map(|i| i.deadline_date),
        internal_deadline_time: internal.map(|i| i.deadline_time),
        notice_date: internal.and_then(|i| i.notice_date),
        notice_time: internal.and_then(|i| i.notice_time),
        has_internal_deadline: internal.is_some(),
        data_source: if internal.is_some() {
            DataSource::Combined
        } else {
            DataSource::OfficialOnly
        },
        notes: official.notes.clone(),
        combined_notes: join_notes([
            official.notes.as_str(),
            internal.map(|i| i.notes.as_str()).unwrap_or_default(),
        ]),
    }
}

fn internal_only(internal: &InternalDeadline, session_number: u32) -> CanonicalSchedule {
    CanonicalSchedule {
        id: CanonicalSchedule::deterministic_id(internal.year, internal.exam_type, session_number),
        year: internal.year,
        exam_type: internal.exam_type,
        session_number,
        session_range: Some(internal.session_range.clone()),
        registration_start: None,
        registration_end: None,
        exam_date: None,
        exam_time_start: None,
        exam_time_end: None,
        locations: Default::default(),
        internal_deadline_date: Some(internal.deadline_date),
        internal_deadline_time: Some(internal.deadline_time),
        notice_date: internal.notice_date,
        notice_time: internal.notice_time,
        has_internal_deadline: true,
        data_source: DataSource::InternalOnly,
        notes: internal.notes.clone(),
        combined_notes: join_notes([internal.notes.as_str()]),
    }
}

/// Produces canonical records sorted by `(year, exam_type, session_number)`.
/// The result depends only on the inputs, so reconciling the same pair twice
/// yields identical output, ids included.
pub fn reconcile(
    officials: &[OfficialSession],
    internals: &[InternalDeadline],
) -> Vec<CanonicalSchedule> {
    // Pass 1: every official session, matched to the first covering deadline.
    let mut emitted: BTreeMap<SessionKey, CanonicalSchedule> = merge_officials(officials)
        .into_iter()
        .map(|(key, official)| {
            let matched = internals.iter().find(|i| i.covers(key.1, key.2));
            if internals.iter().filter(|i| i.covers(key.1, key.2)).count() > 1 {
                warn!(
                    "{} session {} is covered by several internal deadlines; using the first",
                    key.1, key.2
                );
            }
            (key, from_official(key, &official, matched))
        })
        .collect();

    // Pass 2: re-derive coverage from what pass 1 emitted, using the same
    // `(exam_type, session_number)` criterion as `covers`.
    for internal in internals {
        for &n in &internal.session_numbers {
            let already = emitted
                .keys()
                .any(|&(_, exam_type, session)| exam_type == internal.exam_type && session == n);
            if already {
                continue;
            }
            let key = (internal.year, internal.exam_type, n);
            debug!("{} session {n} has only an internal deadline", internal.exam_type);
            emitted.insert(key, internal_only(internal, n));
        }
    }

    emitted.into_values().collect()
}

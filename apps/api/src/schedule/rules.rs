//! Deterministic text-to-structure parser. Produces the same
//! `{ "schedules": [...] }` payload as the LLM structuring endpoint, using
//! only the documented keyword and regex rules.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::schedule::locations;
use crate::schedule::parsing::{
    find_dates, parse_session_number, parse_session_range, parse_time, parse_time_range,
};
use crate::schedule::structurer::ExtractionHint;
use crate::schedule::types::ExamType;

static REGISTRATION_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"접수(?:기간)?\s*:?\s*(\d{1,2}\s*월\s*\d{1,2}\s*일)(?:\s*\([^)]*\))?\s*[~\-–]\s*(\d{1,2}\s*월\s*\d{1,2}\s*일)(?:\s*\([^)]*\))?",
    )
    .expect("Invalid registration window regex")
});

const NOTICE_KEYWORDS: &[&str] = &["수험표", "합격자 발표", "발표", "공지"];

/// Structures official notice text (OCR output or pasted notice).
pub fn structure_official(text: &str, hint: &ExtractionHint) -> Value {
    let document_type = ExamType::sniff(text);
    let mut schedules = Vec::new();
    let mut pending_registration: Option<(String, String)> = None;

    for segment in segments(text, |piece| {
        has_region(piece) || parse_session_number(piece).is_some()
    }) {
        let mut rest = segment.clone();
        let mut registration = None;
        if let Some(caps) = REGISTRATION_WINDOW.captures(&segment) {
            registration = Some((caps[1].to_string(), caps[2].to_string()));
            rest = rest.replace(&caps[0], " ");
        }

        let exam_date = find_dates(&rest, hint.year)
            .into_iter()
            .next()
            .map(|(_, span)| rest[span].to_string());
        let session_number = parse_session_number(&rest);
        let regions: Vec<&str> = locations::tokenize(&rest)
            .into_iter()
            .filter(|t| locations::is_known_token(t))
            .collect();

        if exam_date.is_none() && session_number.is_none() && regions.is_empty() {
            // A standalone registration line applies to the rows that follow.
            if registration.is_some() {
                pending_registration = registration;
            }
            continue;
        }

        let (time_start, time_end) = match parse_time_range(&rest) {
            Some((start, end)) => (Some(start), Some(end)),
            None => (parse_time(&rest), None),
        };
        let registration = registration.or_else(|| pending_registration.clone());
        let exam_type = ExamType::sniff(&segment).or(document_type);

        schedules.push(json!({
            "year": hint.year,
            "exam_type": exam_type.map(|t| t.as_str()),
            "session_number": session_number,
            "registration_start": registration.as_ref().map(|r| r.0.clone()),
            "registration_end": registration.as_ref().map(|r| r.1.clone()),
            "exam_date": exam_date,
            "exam_time_start": time_start.map(|t| t.format("%H:%M").to_string()),
            "exam_time_end": time_end.map(|t| t.format("%H:%M").to_string()),
            "locations": regions,
            "notes": "",
        }));
    }

    json!({ "schedules": schedules })
}

/// Structures internal deadline memo text.
pub fn structure_internal(text: &str, hint: &ExtractionHint) -> Value {
    let document_type = ExamType::sniff(text);
    let mut schedules: Vec<Value> = Vec::new();

    for segment in segments(text, |piece| parse_session_range(piece).is_some()) {
        let (deadline_part, notice_part) = split_notice(&segment);

        let Some(range) = parse_session_range(deadline_part) else {
            // "수험표 발표: 11월 7일 오후 2시" on its own line belongs to the
            // deadline above it.
            if let (Some(last), Some(notice)) = (schedules.last_mut(), notice_part) {
                if last["notice_date"].is_null() {
                    let (date, time) = date_and_time(notice, hint.year);
                    last["notice_date"] = json!(date);
                    last["notice_time"] = json!(time);
                }
            }
            continue;
        };

        let (deadline_date, deadline_time) = date_and_time(deadline_part, hint.year);
        if deadline_date.is_none() {
            tracing::debug!("Session range '{}' has no deadline date; skipping", range.label);
            continue;
        }
        let (notice_date, notice_time) = notice_part
            .map(|n| date_and_time(n, hint.year))
            .unwrap_or((None, None));
        let exam_type = ExamType::sniff(&segment).or(document_type);

        schedules.push(json!({
            "year": hint.year,
            "exam_type": exam_type.map(|t| t.as_str()),
            "session_range": range.label,
            "deadline_date": deadline_date,
            "deadline_time": deadline_time,
            "notice_date": notice_date,
            "notice_time": notice_time,
            "notes": "",
        }));
    }

    json!({ "schedules": schedules })
}

/// First date fragment in `text` and the time written after it.
fn date_and_time(text: &str, year: i32) -> (Option<String>, Option<String>) {
    match find_dates(text, year).into_iter().next() {
        Some((_, span)) => {
            let time = parse_time(&text[span.end..]).map(|t| t.format("%H:%M").to_string());
            (Some(text[span].to_string()), time)
        }
        None => (None, None),
    }
}

fn split_notice(segment: &str) -> (&str, Option<&str>) {
    let cut = NOTICE_KEYWORDS
        .iter()
        .filter_map(|k| segment.find(k))
        .min();
    match cut {
        Some(idx) => (&segment[..idx], Some(&segment[idx..])),
        None => (segment, None),
    }
}

fn has_region(piece: &str) -> bool {
    locations::tokenize(piece)
        .into_iter()
        .any(locations::is_known_token)
}

/// Splits text into record-sized segments: lines (and `;`), then top-level
/// commas. A comma piece that does not start a new record (per `starts_record`)
/// is glued back onto the previous piece.
fn segments(text: &str, starts_record: impl Fn(&str) -> bool) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.split(['\n', ';']) {
        let mut current: Option<String> = None;
        for piece in split_top_level_commas(line) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            match current.as_mut() {
                Some(cur) if !starts_record(piece) => {
                    cur.push_str(", ");
                    cur.push_str(piece);
                }
                _ => {
                    if let Some(done) = current.take() {
                        out.push(done);
                    }
                    current = Some(piece.to_string());
                }
            }
        }
        out.extend(current);
    }
    out
}

fn split_top_level_commas(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in line.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(&line[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&line[start..]);
    pieces
}

//! Converts the many record shapes the Fathom API has returned over time into
//! [`MeetingRecord`] and a Markdown-renderable transcript body.
//!
//! Field lookups walk a fixed priority list; the first present, non-empty
//! value wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{FathomError, Result};
use crate::models::{MeetingRecord, NO_TRANSCRIPT_MARKER, UNKNOWN_DATE, UNTITLED_MEETING};

const ID_FIELDS: &[&str] = &[
    "id",
    "meeting_id",
    "meetingId",
    "recording_id",
    "recordingId",
    "call_id",
    "callId",
];
const RECORDING_ID_FIELDS: &[&str] = &["recording_id", "recordingId"];
const TITLE_FIELDS: &[&str] = &["title", "meeting_title", "meetingTitle", "name"];
const DATE_FIELDS: &[&str] = &[
    "date",
    "recording_start_time",
    "scheduled_start_time",
    "started_at",
    "startedAt",
    "created_at",
    "createdAt",
];
const URL_FIELDS: &[&str] = &["share_url", "url"];
const TRANSCRIPT_FIELDS: &[&str] = &["transcript", "transcript_text", "transcriptText", "content"];

// Epoch values above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

pub fn normalize_meeting(raw: &Value) -> Result<MeetingRecord> {
    let id = first_string(raw, ID_FIELDS).ok_or_else(|| {
        FathomError::Validation(format!(
            "meeting record has no id (looked for {})",
            ID_FIELDS.join(", ")
        ))
    })?;

    let recording_id = first_string(raw, RECORDING_ID_FIELDS).unwrap_or_else(|| id.clone());

    let title = first_string(raw, TITLE_FIELDS)
        .map(|t| collapse_whitespace(&t))
        .unwrap_or_else(|| UNTITLED_MEETING.to_string());

    let date = DATE_FIELDS
        .iter()
        .filter_map(|field| raw.get(*field))
        .find(|v| !is_blank(v))
        .map(normalize_date)
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    Ok(MeetingRecord {
        id,
        title,
        date,
        recording_id,
        participants: extract_participants(raw),
        url: first_string(raw, URL_FIELDS),
    })
}

/// Formats a date-ish value as `YYYY-MM-DD`. Anything unparsable becomes
/// [`UNKNOWN_DATE`].
pub fn normalize_date(raw: &Value) -> String {
    let parsed = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(date_from_epoch),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    };

    parsed
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(date_from_epoch);
    }
    None
}

fn date_from_epoch(value: i64) -> Option<NaiveDate> {
    let secs = if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        value / 1000
    } else {
        value
    };
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

/// Invitee names, falling back to their email when the name is blank.
pub fn extract_participants(raw: &Value) -> Vec<String> {
    let entries = raw
        .get("calendar_invitees")
        .and_then(Value::as_array)
        .or_else(|| raw.get("participants").and_then(Value::as_array));

    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => non_empty(s),
            Value::Object(_) => entry
                .get("name")
                .and_then(Value::as_str)
                .and_then(non_empty)
                .or_else(|| entry.get("email").and_then(Value::as_str).and_then(non_empty)),
            _ => None,
        })
        .collect()
}

/// Renders a transcript payload. Never returns an empty string: absent or
/// empty payloads become [`NO_TRANSCRIPT_MARKER`].
pub fn normalize_transcript(raw: Option<&Value>) -> String {
    raw.and_then(render_transcript)
        .unwrap_or_else(|| NO_TRANSCRIPT_MARKER.to_string())
}

/// Transcript carried inline on a list item, if the list was requested with
/// transcripts included.
pub fn embedded_transcript(raw: &Value) -> Option<String> {
    TRANSCRIPT_FIELDS
        .iter()
        .filter_map(|field| raw.get(*field))
        .find_map(render_transcript)
}

fn render_transcript(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Array(entries) => render_entries(entries),
        Value::Object(_) => TRANSCRIPT_FIELDS
            .iter()
            .chain(std::iter::once(&"data"))
            .filter_map(|field| value.get(*field))
            .find_map(render_transcript)
            .or_else(|| render_turn(value)),
        _ => None,
    }
}

fn render_entries(entries: &[Value]) -> Option<String> {
    let has_turns = entries.iter().any(Value::is_object);
    let lines: Vec<String> = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(_) => render_turn(entry),
            Value::String(s) => non_empty(s),
            _ => None,
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let separator = if has_turns { "\n\n" } else { "\n" };
    Some(lines.join(separator))
}

fn render_turn(turn: &Value) -> Option<String> {
    let text = turn.get("text").and_then(Value::as_str).and_then(non_empty)?;
    let speaker = speaker_name(turn).unwrap_or_else(|| "Unknown".to_string());
    Some(format!("**{}:** {}", speaker, text))
}

fn speaker_name(turn: &Value) -> Option<String> {
    let speaker = match turn.get("speaker") {
        Some(Value::String(s)) => non_empty(s),
        Some(obj @ Value::Object(_)) => ["display_name", "name"]
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .find_map(non_empty),
        _ => None,
    };
    speaker.or_else(|| {
        ["speaker_name", "speakerName"]
            .iter()
            .filter_map(|k| turn.get(*k).and_then(Value::as_str))
            .find_map(non_empty)
    })
}

fn first_string(raw: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().filter_map(|f| raw.get(*f)).find_map(|v| match v {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// Titles land on a single Markdown heading line.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

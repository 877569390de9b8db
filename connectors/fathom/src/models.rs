use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub const UNTITLED_MEETING: &str = "Untitled Meeting";
pub const UNKNOWN_DATE: &str = "unknown-date";
pub const NO_TRANSCRIPT_MARKER: &str = "(No transcript available)";

/// Canonical meeting produced by the normalizer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRecord {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`, or [`UNKNOWN_DATE`].
    pub date: String,
    pub recording_id: String,
    pub participants: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub meeting_id: String,
    pub body: String,
}

impl TranscriptRecord {
    pub fn is_available(&self) -> bool {
        self.body != NO_TRANSCRIPT_MARKER
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub filename: String,
    pub meeting_id: String,
    pub title: String,
    pub date: String,
    pub written_at: DateTime<Utc>,
}

/// One page of the meetings list, as returned by a list endpoint strategy.
#[derive(Debug, Clone, Default)]
pub struct MeetingsPage {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

impl MeetingsPage {
    /// Cursor for the next request, if the API reported one.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Final counts. Serialized into the summary log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub listed: usize,
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Listing,
    Exporting(usize),
    Done,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_summary_serializes_counts() {
        let summary = RunSummary {
            listed: 4,
            exported: 2,
            skipped: 1,
            failed: 1,
        };
        assert!(summary.has_failures());
        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            json!({"listed": 4, "exported": 2, "skipped": 1, "failed": 1})
        );
    }

    #[test]
    fn test_empty_cursor_means_last_page() {
        let page = MeetingsPage {
            items: vec![],
            next_cursor: Some(String::new()),
        };
        assert_eq!(page.cursor(), None);
    }
}

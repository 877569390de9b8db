use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::{ExportedFile, MeetingRecord, TranscriptRecord};
use crate::sanitize::sanitize;

pub const INDEX_FILE_NAME: &str = "index.csv";
pub const INDEX_HEADER: [&str; 4] = ["id", "date", "title", "filename"];

pub fn render_markdown(meeting: &MeetingRecord, transcript: &TranscriptRecord) -> String {
    let mut content = String::new();

    content.push_str(&format!("# {}\n\n", meeting.title));

    let mut meta_parts = vec![
        format!("**Date:** {}", meeting.date),
        format!("**ID:** {}", meeting.id),
    ];
    if !meeting.participants.is_empty() {
        meta_parts.push(format!(
            "**Participants:** {}",
            meeting.participants.join(", ")
        ));
    }
    if let Some(url) = &meeting.url {
        meta_parts.push(format!("**URL:** {}", url));
    }
    content.push_str(&format!("{}\n\n", meta_parts.join(" | ")));

    content.push_str("## Transcript\n\n");
    content.push_str(&transcript.body);
    content.push('\n');

    content
}

/// Writes one meeting to `{output_dir}/{sanitized}.md`. The file is written
/// under a temporary name and renamed into place, so an interrupted run never
/// leaves a partial file under the final name.
pub fn export_one(
    meeting: &MeetingRecord,
    transcript: &TranscriptRecord,
    output_dir: &Path,
) -> Result<ExportedFile> {
    let filename = format!("{}.md", sanitize(&meeting.title, &meeting.date, &meeting.id));
    let path = output_dir.join(&filename);
    let tmp_path = output_dir.join(format!(".{}.tmp", filename));

    let content = render_markdown(meeting, transcript);
    write_atomic(&tmp_path, &path, content.as_bytes())?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());

    Ok(ExportedFile {
        path,
        filename,
        meeting_id: meeting.id.clone(),
        title: meeting.title.clone(),
        date: meeting.date.clone(),
        written_at: Utc::now(),
    })
}

fn write_atomic(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    Ok(result?)
}

/// Appends rows to `index.csv`, writing the header when the file is new.
/// Rows are de-duplicated by meeting id for the lifetime of the writer.
pub struct IndexWriter {
    path: PathBuf,
    seen: HashSet<String>,
}

impl IndexWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, meeting_id: &str) -> bool {
        self.seen.contains(meeting_id)
    }

    /// Returns `false` without touching the file when the id was already
    /// written by this writer.
    pub fn append_row(&mut self, exported: &ExportedFile) -> Result<bool> {
        if self.seen.contains(&exported.meeting_id) {
            debug!(
                "Index already has a row for {}, not appending",
                exported.meeting_id
            );
            return Ok(false);
        }

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(INDEX_HEADER)?;
        }
        writer.write_record([
            exported.meeting_id.as_str(),
            exported.date.as_str(),
            exported.title.as_str(),
            exported.filename.as_str(),
        ])?;
        writer.flush()?;

        self.seen.insert(exported.meeting_id.clone());
        Ok(true)
    }
}

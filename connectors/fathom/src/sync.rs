use std::fs;
use std::sync::Arc;
use tracing::{error, info};

use crate::client::{fetch_all_meetings, MeetingsApi};
use crate::config::FathomConfig;
use crate::endpoints::{parse_source_json, ListQuery};
use crate::error::{FathomError, Result};
use crate::export::{export_one, IndexWriter};
use crate::models::{MeetingRecord, RunState, RunSummary, TranscriptRecord};
use crate::normalize::{embedded_transcript, normalize_meeting, normalize_transcript};
use crate::progress::{ItemOutcome, ProgressSink};
use crate::retry::RetryPolicy;

struct PendingMeeting {
    record: MeetingRecord,
    inline_transcript: Option<String>,
}

/// Drives one export run: list every meeting, then fetch, normalize and
/// write each one in turn.
pub struct SyncManager {
    api: Arc<dyn MeetingsApi>,
    config: FathomConfig,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
    state: RunState,
}

impl SyncManager {
    pub fn new(
        api: Arc<dyn MeetingsApi>,
        config: FathomConfig,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_delay);
        Self {
            api,
            config,
            retry,
            progress,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.progress.state_changed(state);
    }

    fn fail(&mut self, err: FathomError) -> FathomError {
        error!("Export run failed: {}", err);
        self.set_state(RunState::Failed);
        err
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        self.set_state(RunState::Init);

        if let Err(e) = fs::create_dir_all(&self.config.output_dir) {
            let err = FathomError::Config(format!(
                "Cannot create output directory {}: {}",
                self.config.output_dir.display(),
                e
            ));
            return Err(self.fail(err));
        }
        info!("Output directory: {}", self.config.output_dir.display());

        self.set_state(RunState::Listing);
        let raw_items = match self.list_raw_meetings().await {
            Ok(items) => items,
            Err(e) => return Err(self.fail(e)),
        };

        let mut summary = RunSummary {
            listed: raw_items.len(),
            ..RunSummary::default()
        };
        let total = raw_items.len();

        // Inline transcripts are only trusted when they were asked for.
        let use_inline = self.config.include_transcript;

        let mut pending = Vec::with_capacity(total);
        for (i, raw) in raw_items.iter().enumerate() {
            match normalize_meeting(raw) {
                Ok(record) => pending.push((
                    i,
                    PendingMeeting {
                        record,
                        inline_transcript: use_inline
                            .then(|| embedded_transcript(raw))
                            .flatten(),
                    },
                )),
                Err(e) => {
                    summary.skipped += 1;
                    self.progress.item_finished(
                        i,
                        total,
                        "<missing id>",
                        &ItemOutcome::Skipped {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        let mut index = IndexWriter::new(self.config.index_path());

        for (i, meeting) in &pending {
            self.set_state(RunState::Exporting(*i));

            let outcome = match self.export_meeting(meeting, &mut index).await {
                Ok(outcome) => outcome,
                Err(e @ FathomError::Auth { .. }) => return Err(self.fail(e)),
                Err(
                    e @ (FathomError::NotFound(_)
                    | FathomError::Protocol(_)
                    | FathomError::Validation(_)),
                ) => ItemOutcome::Skipped {
                    reason: e.to_string(),
                },
                Err(e) => ItemOutcome::Failed {
                    reason: e.to_string(),
                },
            };

            match &outcome {
                ItemOutcome::Exported { .. } => summary.exported += 1,
                ItemOutcome::Skipped { .. } => summary.skipped += 1,
                ItemOutcome::Failed { .. } => summary.failed += 1,
            }
            self.progress
                .item_finished(*i, total, &meeting.record.id, &outcome);
        }

        info!("Index file: {}", index.path().display());
        self.set_state(RunState::Done);
        self.progress.finished(&summary);
        Ok(summary)
    }

    async fn list_raw_meetings(&self) -> Result<Vec<serde_json::Value>> {
        if let Some(path) = &self.config.source_json {
            info!("Reading meetings from {}", path.display());
            let items = parse_source_json(path)?;
            info!("Found {} meeting records in {}", items.len(), path.display());
            return Ok(items);
        }

        let base_query = ListQuery {
            cursor: None,
            domains_type: self.config.domains_type,
            page_size: self.config.page_size,
            include_transcript: self.config.include_transcript,
        };

        fetch_all_meetings(
            self.api.as_ref(),
            &base_query,
            self.config.page_limit,
            &self.retry,
            self.progress.as_ref(),
        )
        .await
    }

    async fn export_meeting(
        &self,
        meeting: &PendingMeeting,
        index: &mut IndexWriter,
    ) -> Result<ItemOutcome> {
        let record = &meeting.record;

        if index.contains(&record.id) {
            return Ok(ItemOutcome::Skipped {
                reason: "already exported in this run".to_string(),
            });
        }

        let body = match &meeting.inline_transcript {
            Some(body) => body.clone(),
            None => {
                let label = format!("Fetch transcript for recording {}", record.recording_id);
                let payload = self
                    .retry
                    .run(&label, || self.api.fetch_transcript(&record.recording_id))
                    .await?;
                normalize_transcript(Some(&payload))
            }
        };

        let transcript = TranscriptRecord {
            meeting_id: record.id.clone(),
            body,
        };
        if !transcript.is_available() {
            info!("Meeting {} has an empty transcript", record.id);
        }

        let exported = export_one(record, &transcript, &self.config.output_dir)?;
        index.append_row(&exported)?;

        Ok(ItemOutcome::Exported {
            path: exported.path,
        })
    }
}

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::models::{RunState, RunSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Exported { path: PathBuf },
    Skipped { reason: String },
    Failed { reason: String },
}

/// Receives the step-by-step progress of an export run.
pub trait ProgressSink: Send + Sync {
    fn state_changed(&self, state: RunState);
    fn page_listed(&self, page: u32, items: usize, has_more: bool);
    fn item_finished(&self, index: usize, total: usize, meeting_id: &str, outcome: &ItemOutcome);
    fn finished(&self, summary: &RunSummary);
}

/// Default sink: everything goes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn state_changed(&self, state: RunState) {
        info!("Export state: {:?}", state);
    }

    fn page_listed(&self, page: u32, items: usize, has_more: bool) {
        info!(
            "Meetings page {}: {} items{}",
            page,
            items,
            if has_more { ", more pages available" } else { "" }
        );
    }

    fn item_finished(&self, index: usize, total: usize, meeting_id: &str, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Exported { path } => {
                info!("[{}/{}] Exported {} -> {}", index + 1, total, meeting_id, path.display())
            }
            ItemOutcome::Skipped { reason } => {
                info!("[{}/{}] Skipped {}: {}", index + 1, total, meeting_id, reason)
            }
            ItemOutcome::Failed { reason } => {
                warn!("[{}/{}] Failed {}: {}", index + 1, total, meeting_id, reason)
            }
        }
    }

    fn finished(&self, summary: &RunSummary) {
        let counts = serde_json::to_string(summary).unwrap_or_default();
        info!(
            summary = %counts,
            "Done. Listed {} meetings: {} exported, {} skipped, {} failed",
            summary.listed, summary.exported, summary.skipped, summary.failed
        );
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryProgress {
    states: Mutex<Vec<RunState>>,
    pages: Mutex<Vec<(u32, usize)>>,
    outcomes: Mutex<Vec<(String, ItemOutcome)>>,
    summary: Mutex<Option<RunSummary>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<RunState> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// `(page number, item count)` per list page.
    pub fn pages(&self) -> Vec<(u32, usize)> {
        self.pages.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn outcomes(&self) -> Vec<(String, ItemOutcome)> {
        self.outcomes.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn outcome_for(&self, meeting_id: &str) -> Option<ItemOutcome> {
        self.outcomes()
            .into_iter()
            .find(|(id, _)| id == meeting_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.lock().ok().and_then(|s| *s)
    }
}

impl ProgressSink for MemoryProgress {
    fn state_changed(&self, state: RunState) {
        if let Ok(mut states) = self.states.lock() {
            states.push(state);
        }
    }

    fn page_listed(&self, page: u32, items: usize, _has_more: bool) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.push((page, items));
        }
    }

    fn item_finished(&self, _index: usize, _total: usize, meeting_id: &str, outcome: &ItemOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push((meeting_id.to_string(), outcome.clone()));
        }
    }

    fn finished(&self, summary: &RunSummary) {
        if let Ok(mut s) = self.summary.lock() {
            *s = Some(*summary);
        }
    }
}

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod retry;
pub mod sanitize;
pub mod sync;
pub mod telemetry;

pub use client::{FathomClient, MeetingsApi};
pub use config::FathomConfig;
pub use error::FathomError;
pub use models::{ExportedFile, MeetingRecord, RunState, RunSummary, TranscriptRecord};
pub use progress::{ItemOutcome, MemoryProgress, ProgressSink, TracingProgress};
pub use sync::SyncManager;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FathomError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication failed (HTTP {status}) for {endpoint}. Check your Fathom API key.")]
    Auth { status: u16, endpoint: String },
    #[error(
        "Could not find meeting records using any known endpoint. Attempted: {}",
        attempted.join("; ")
    )]
    Discovery { attempted: Vec<String> },
    #[error("Transient error: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FathomError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Errors that end the whole run rather than a single meeting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Auth { .. } | Self::Discovery { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FathomError>;

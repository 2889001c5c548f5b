//! Transcript Grabber - extract timestamped YouTube transcripts by driving a real browser
//!
//! The library navigates the watch page the way a person would (expand the description,
//! press "Show transcript", wait for the panel) and reads the rendered segment list.
//! No public data API is involved, so every step tolerates slow loads and layout drift.

pub mod batch;
pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod output;
pub mod session;
pub mod utils;

pub use batch::{BatchOrchestrator, BatchSummary};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extract::{
    ExtractionResult, Transcript, TranscriptExtractor, TranscriptSegment, VideoId,
};
pub use session::{PageContext, SessionManager};

use serde::{Deserialize, Serialize};

/// Result type used outside the extraction core (config, CLI, output)
pub type Result<T> = anyhow::Result<T>;

/// Failure categories reported per video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    VideoNotFound,
    TranscriptNotFound,
    Browser,
    Session,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::VideoNotFound => write!(f, "VideoNotFoundError"),
            ErrorKind::TranscriptNotFound => write!(f, "TranscriptNotFoundError"),
            ErrorKind::Browser => write!(f, "BrowserError"),
            ErrorKind::Session => write!(f, "SessionError"),
        }
    }
}

/// Error types produced by the extraction core
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),

    #[error("Browser automation failed: {0}")]
    Browser(String),

    #[error("Browser session unavailable: {0}")]
    Session(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::VideoNotFound(_) => ErrorKind::VideoNotFound,
            ExtractionError::TranscriptNotFound(_) => ErrorKind::TranscriptNotFound,
            ExtractionError::Browser(_) => ErrorKind::Browser,
            ExtractionError::Session(_) => ErrorKind::Session,
        }
    }

    /// Human-readable detail without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            ExtractionError::VideoNotFound(d)
            | ExtractionError::TranscriptNotFound(d)
            | ExtractionError::Browser(d)
            | ExtractionError::Session(d) => d,
        }
    }

    /// Only process/communication faults are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::Browser(_))
    }
}

impl From<chromiumoxide::error::CdpError> for ExtractionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ExtractionError::Browser(err.to_string())
    }
}

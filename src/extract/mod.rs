use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::browser::chromium::ChromiumLauncher;
use crate::browser::PageDriver;
use crate::config::{Config, ExtractionSettings};
use crate::session::SessionManager;
use crate::{ErrorKind, ExtractionError};

pub mod locators;
pub mod navigation;
pub mod parser;
pub mod retry;

use locators::Locators;
use navigation::{Navigator, StageBudgets};
use parser::SegmentParser;
use retry::{with_ceiling, RetryPolicy};

const VIDEO_ID_LEN: usize = 11;
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Syntactically valid YouTube video id (11 characters of `[A-Za-z0-9_-]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        let value = value.trim();
        if value.len() != VIDEO_ID_LEN {
            anyhow::bail!(
                "video id must be {} characters, got {} in {:?}",
                VIDEO_ID_LEN,
                value.len(),
                value
            );
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            anyhow::bail!("invalid character {:?} in video id {:?}", bad, value);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("{}{}", WATCH_URL, self.0)
    }
}

impl std::str::FromStr for VideoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One caption line as displayed by the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Display timestamp, e.g. `1:02:03`
    pub timestamp: String,

    /// Caption text, trimmed
    pub text: String,
}

/// Segments in the order the page renders them. Never empty when produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }
}

/// Outcome for one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    Success(Transcript),
    Failure { kind: ErrorKind, detail: String },
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            ExtractionResult::Success(transcript) => Some(transcript),
            ExtractionResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExtractionResult::Success(_) => None,
            ExtractionResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<Transcript, ExtractionError>> for ExtractionResult {
    fn from(result: Result<Transcript, ExtractionError>) -> Self {
        match result {
            Ok(transcript) => ExtractionResult::Success(transcript),
            Err(err) => ExtractionResult::Failure {
                kind: err.kind(),
                detail: err.detail().to_string(),
            },
        }
    }
}

/// Single-video pipeline: context, navigation, parsing, cleanup
pub struct TranscriptExtractor {
    session: Arc<SessionManager>,
    navigator: Navigator,
    parser: SegmentParser,
    video_timeout: Duration,
}

impl TranscriptExtractor {
    pub fn new(session: Arc<SessionManager>, settings: &ExtractionSettings) -> Self {
        Self::with_locators(session, settings, Locators::default())
    }

    pub fn with_locators(
        session: Arc<SessionManager>,
        settings: &ExtractionSettings,
        locators: Locators,
    ) -> Self {
        let retry = RetryPolicy::from_settings(settings);
        Self {
            session,
            navigator: Navigator::new(locators, StageBudgets::from_settings(settings), retry.clone()),
            parser: SegmentParser::new(retry),
            video_timeout: settings.video_timeout(),
        }
    }

    /// Launch the configured browser and build an extractor on top of it
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let launcher = ChromiumLauncher::new(
            config.browser.clone(),
            config.extraction.per_stage_timeout(),
        );
        let session = SessionManager::start(Arc::new(launcher)).await?;
        Ok(Self::new(Arc::new(session), &config.extraction))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Extract the transcript of one video. Never panics or returns early without
    /// releasing the page context; every failure is folded into the result.
    pub async fn extract(&self, video_id: &VideoId) -> ExtractionResult {
        let span = tracing::info_span!("extract", video = %video_id);
        let result = self.extract_inner(video_id).instrument(span).await;

        match &result {
            Ok(transcript) => {
                tracing::info!("Extracted {} segment(s) for {}", transcript.len(), video_id)
            }
            Err(err) => tracing::info!("Extraction failed for {}: {}", video_id, err),
        }
        result.into()
    }

    async fn extract_inner(&self, video_id: &VideoId) -> Result<Transcript, ExtractionError> {
        let context = self.session.acquire_context(video_id).await?;

        let outcome = with_ceiling(self.video_timeout, self.run(context.page(), video_id)).await;

        if let Err(err) = self.session.release_context(context).await {
            tracing::warn!("Failed to release page context for {}: {}", video_id, err);
        }
        outcome
    }

    async fn run(
        &self,
        page: &dyn PageDriver,
        video_id: &VideoId,
    ) -> Result<Transcript, ExtractionError> {
        let layout = self.navigator.drive(page, video_id).await?;
        self.parser.read(page, &layout).await
    }
}

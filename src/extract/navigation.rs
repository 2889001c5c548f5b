use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use crate::browser::{PageDriver, SegmentLayout, Selector};
use crate::config::ExtractionSettings;
use crate::ExtractionError;

use super::locators::Locators;
use super::retry::RetryPolicy;
use super::VideoId;

/// Where a page is in the watch-page flow. Each variant is reached by one guarded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// Blank context, nothing navigated yet
    Idle,
    /// Watch page document is interactive
    Loading,
    /// Description expanded, or there was nothing to expand
    MetadataExpanded,
    /// Transcript control activated
    TranscriptRevealed,
    /// At least one segment node rendered
    PanelReady,
}

impl NavState {
    pub fn next(self) -> Option<NavState> {
        match self {
            NavState::Idle => Some(NavState::Loading),
            NavState::Loading => Some(NavState::MetadataExpanded),
            NavState::MetadataExpanded => Some(NavState::TranscriptRevealed),
            NavState::TranscriptRevealed => Some(NavState::PanelReady),
            NavState::PanelReady => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NavState::Idle => "idle",
            NavState::Loading => "loading",
            NavState::MetadataExpanded => "metadata-expanded",
            NavState::TranscriptRevealed => "transcript-revealed",
            NavState::PanelReady => "panel-ready",
        }
    }
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wait budgets for each transition
#[derive(Debug, Clone)]
pub struct StageBudgets {
    pub load: Duration,
    pub expander: Duration,
    pub reveal: Duration,
    pub panel: Duration,
    pub poll_interval: Duration,
    pub action_delay: Duration,
}

impl StageBudgets {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            load: Duration::from_millis(settings.per_stage_timeout_ms),
            expander: Duration::from_millis(settings.expander_timeout_ms),
            reveal: Duration::from_millis(settings.reveal_timeout_ms),
            panel: Duration::from_millis(settings.panel_timeout_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            action_delay: Duration::from_millis(settings.inter_action_delay_ms),
        }
    }
}

/// Drives one page from a blank context to a rendered transcript panel
#[derive(Debug, Clone)]
pub struct Navigator {
    locators: Locators,
    budgets: StageBudgets,
    retry: RetryPolicy,
}

impl Navigator {
    pub fn new(locators: Locators, budgets: StageBudgets, retry: RetryPolicy) -> Self {
        Self {
            locators,
            budgets,
            retry,
        }
    }

    /// Run every transition in order and return the panel layout that rendered
    pub async fn drive(
        &self,
        page: &dyn PageDriver,
        video_id: &VideoId,
    ) -> Result<SegmentLayout, ExtractionError> {
        let mut state = NavState::Idle;
        let mut layout = None;
        let mut metadata_seen = false;

        while let Some(target) = state.next() {
            let stage = target.as_str();
            match target {
                NavState::Idle => {}
                NavState::Loading => {
                    metadata_seen = self
                        .retry
                        .run(stage, move || self.load(page, video_id))
                        .await?;
                }
                NavState::MetadataExpanded => {
                    self.retry
                        .run(stage, move || self.expand_metadata(page))
                        .await?
                }
                NavState::TranscriptRevealed => {
                    // Activation gets exactly one more try.
                    self.retry
                        .with_max_retries(self.retry.max_attempts().min(2) - 1)
                        .run(stage, move || self.reveal_transcript(page, video_id, metadata_seen))
                        .await?
                }
                NavState::PanelReady => {
                    layout = Some(
                        self.retry
                            .run(stage, move || self.await_panel(page, video_id))
                            .await?,
                    );
                }
            }
            state = target;
            tracing::debug!("{} -> {}", video_id, state);
        }

        layout.ok_or_else(|| {
            ExtractionError::Browser("navigation finished without a transcript panel".into())
        })
    }

    /// Navigate and wait for an interactive document, then look for unavailability markers.
    /// Returns whether watch-page metadata was seen.
    async fn load(&self, page: &dyn PageDriver, video_id: &VideoId) -> Result<bool, ExtractionError> {
        let url = video_id.watch_url();
        let deadline = Instant::now() + self.budgets.load;
        tracing::info!("Navigating to: {}", url);

        match timeout(self.budgets.load, page.goto(&url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExtractionError::Browser(format!(
                    "navigation to {} timed out after {:?}",
                    url, self.budgets.load
                )))
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let ready = poll_until(remaining, self.budgets.poll_interval, move || async move {
            Ok(page.ready_state().await?.is_interactive().then_some(()))
        })
        .await?;
        if ready.is_none() {
            return Err(ExtractionError::Browser(format!(
                "page never became interactive within {:?}",
                self.budgets.load
            )));
        }

        // The player error screen can trail the document; give the watch page a short
        // window to show either real metadata or the error marker.
        let outcome = poll_until(self.budgets.expander, self.budgets.poll_interval, move || async move {
            if first_match(page, &self.locators.not_found).await?.is_some() {
                return Ok(Some(false));
            }
            Ok(first_match(page, &self.locators.page_ready)
                .await?
                .map(|_| true))
        })
        .await?;

        match outcome {
            Some(false) => Err(ExtractionError::VideoNotFound(format!(
                "video {} is unavailable",
                video_id
            ))),
            Some(true) => Ok(true),
            None => {
                tracing::debug!("No watch metadata seen for {}; continuing", video_id);
                Ok(false)
            }
        }
    }

    /// Best-effort: a missing expander is a skip, not a failure
    async fn expand_metadata(&self, page: &dyn PageDriver) -> Result<(), ExtractionError> {
        let found = poll_until(self.budgets.expander, self.budgets.poll_interval, move || {
            first_match(page, &self.locators.expander)
        })
        .await?;

        let Some(selector) = found else {
            tracing::debug!("Description expander not found, continuing");
            return Ok(());
        };

        if page.click(selector).await? {
            self.pause().await;
        } else {
            tracing::debug!("Description expander vanished before click, continuing");
        }
        Ok(())
    }

    async fn reveal_transcript(
        &self,
        page: &dyn PageDriver,
        video_id: &VideoId,
        metadata_seen: bool,
    ) -> Result<(), ExtractionError> {
        let found = poll_until(self.budgets.reveal, self.budgets.poll_interval, move || {
            first_match(page, &self.locators.reveal)
        })
        .await?;

        let Some(selector) = found else {
            // Neither metadata nor a transcript control: the watch page never resolved.
            if !metadata_seen {
                return Err(ExtractionError::VideoNotFound(format!(
                    "watch page for {} rendered no video metadata",
                    video_id
                )));
            }
            return Err(ExtractionError::TranscriptNotFound(format!(
                "no transcript control appeared for {} within {:?}",
                video_id, self.budgets.reveal
            )));
        };

        tracing::debug!("Activating transcript control via {}", selector);
        if !page.click(selector).await? {
            return Err(ExtractionError::Browser(
                "transcript control disappeared before activation".into(),
            ));
        }
        self.pause().await;
        Ok(())
    }

    /// Wait for the first known layout to render a segment node
    async fn await_panel(
        &self,
        page: &dyn PageDriver,
        video_id: &VideoId,
    ) -> Result<SegmentLayout, ExtractionError> {
        let found = poll_until(self.budgets.panel, self.budgets.poll_interval, move || async move {
            for layout in &self.locators.segments {
                if page.count_segments(layout).await? > 0 {
                    return Ok(Some(layout.clone()));
                }
            }
            Ok(None)
        })
        .await?;

        found.ok_or_else(|| {
            ExtractionError::TranscriptNotFound(format!(
                "transcript panel for {} rendered no segments within {:?}",
                video_id, self.budgets.panel
            ))
        })
    }

    async fn pause(&self) {
        if !self.budgets.action_delay.is_zero() {
            sleep(self.budgets.action_delay).await;
        }
    }
}

/// First strategy in `candidates` that currently matches
async fn first_match<'a>(
    page: &dyn PageDriver,
    candidates: &'a [Selector],
) -> Result<Option<&'a Selector>, ExtractionError> {
    for selector in candidates {
        if page.exists(selector).await? {
            return Ok(Some(selector));
        }
    }
    Ok(None)
}

/// Run `check` until it yields a value or `budget` runs out. It always runs at least once.
async fn poll_until<T, F, Fut>(
    budget: Duration,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ExtractionError>>,
{
    let deadline = Instant::now() + budget;
    loop {
        if let Some(value) = check().await? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        sleep(interval.min(deadline - now)).await;
    }
}

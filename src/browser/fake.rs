//! Scripted in-memory browser for exercising the engine without Chrome.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BrowserBackend, MockBrowserLauncher, PageDriver, RawSegmentNode, ReadyState, SegmentLayout, Selector};
use crate::extract::locators::Locators;
use crate::ExtractionError;

/// Driver call a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeStage {
    Goto,
    Expand,
    Reveal,
    Panel,
    Parse,
}

/// What the watch page of one video looks like
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeVideo {
    pub unavailable: bool,
    /// Document loads but renders neither metadata nor a not-found marker
    pub blank: bool,
    pub ready_after_polls: usize,
    pub never_ready: bool,
    pub expander: bool,
    /// Index into `Locators::reveal` of the strategy that finds the control
    pub reveal_strategy: Option<usize>,
    /// Index into `Locators::segments` of the rendered layout
    pub layout: usize,
    pub segments: Vec<RawSegmentNode>,
    pub fail_at: Option<(FakeStage, usize)>,
    pub hang_at: Option<FakeStage>,
}

impl FakeVideo {
    pub fn with_transcript(segments: &[(&str, &str)]) -> Self {
        Self {
            expander: true,
            reveal_strategy: Some(0),
            segments: segments
                .iter()
                .map(|(ts, text)| RawSegmentNode::new(ts, text))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_raw_segments(segments: Vec<RawSegmentNode>) -> Self {
        Self {
            expander: true,
            reveal_strategy: Some(0),
            segments,
            ..Self::default()
        }
    }

    pub fn without_transcript() -> Self {
        Self {
            expander: true,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn blank() -> Self {
        Self {
            blank: true,
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, stage: FakeStage, times: usize) -> Self {
        self.fail_at = Some((stage, times));
        self
    }

    pub fn hanging_at(mut self, stage: FakeStage) -> Self {
        self.hang_at = Some(stage);
        self
    }
}

/// Counters shared by a fake browser and all its pages
#[derive(Debug, Default)]
pub(crate) struct FakeStats {
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub shutdowns: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeStats {
    pub fn opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Most pages that were open at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeBrowser {
    videos: Arc<HashMap<String, FakeVideo>>,
    alive: AtomicBool,
    pub stats: Arc<FakeStats>,
}

impl FakeBrowser {
    pub fn new(videos: HashMap<String, FakeVideo>) -> Self {
        Self::with_stats(videos, Arc::new(FakeStats::default()))
    }

    pub fn with_stats(videos: HashMap<String, FakeVideo>, stats: Arc<FakeStats>) -> Self {
        Self {
            videos: Arc::new(videos),
            alive: AtomicBool::new(true),
            stats,
        }
    }

    /// Simulate the browser process dying
    pub fn crash(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrowserBackend for FakeBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, ExtractionError> {
        if !self.is_alive() {
            return Err(ExtractionError::Browser("target closed".into()));
        }
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            videos: Arc::clone(&self.videos),
            locators: Locators::default(),
            state: Mutex::new(PageState::default()),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), ExtractionError> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out a fresh fake browser on every launch, all sharing `stats`
pub(crate) fn fake_launcher(
    videos: HashMap<String, FakeVideo>,
    stats: Arc<FakeStats>,
) -> MockBrowserLauncher {
    let mut launcher = MockBrowserLauncher::new();
    launcher.expect_launch().returning(move || {
        Ok(Arc::new(FakeBrowser::with_stats(videos.clone(), Arc::clone(&stats)))
            as Arc<dyn BrowserBackend>)
    });
    launcher.expect_engine_name().return_const("fake");
    launcher
}

#[derive(Debug, Default)]
struct PageState {
    video: Option<FakeVideo>,
    loaded: Option<String>,
    polls: usize,
    revealed: bool,
    failures_left: usize,
}

pub(crate) struct FakePage {
    videos: Arc<HashMap<String, FakeVideo>>,
    locators: Locators,
    state: Mutex<PageState>,
    stats: Arc<FakeStats>,
}

impl FakePage {
    fn video(&self) -> FakeVideo {
        self.state
            .lock()
            .map(|s| s.video.clone().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Fail or hang if the script says so for this stage
    async fn trip(&self, stage: FakeStage) -> Result<(), ExtractionError> {
        let video = self.video();
        if video.hang_at == Some(stage) {
            std::future::pending::<()>().await;
        }
        if let Some((fail_stage, _)) = video.fail_at {
            if fail_stage == stage {
                let mut state = self.state.lock().expect("fake page state poisoned");
                if state.failures_left > 0 {
                    state.failures_left -= 1;
                    return Err(ExtractionError::Browser(format!(
                        "injected failure at {:?}",
                        stage
                    )));
                }
            }
        }
        Ok(())
    }

    fn matches(&self, selector: &Selector) -> bool {
        let video = self.video();
        if self.locators.not_found.contains(selector) {
            return video.unavailable;
        }
        if video.unavailable || video.blank {
            return false;
        }
        if self.locators.page_ready.contains(selector) {
            return true;
        }
        if self.locators.expander.contains(selector) {
            return video.expander;
        }
        match self.locators.reveal.iter().position(|s| s == selector) {
            Some(index) => video.reveal_strategy == Some(index),
            None => false,
        }
    }

    fn rendered(&self, layout: &SegmentLayout) -> Vec<RawSegmentNode> {
        let state = self.state.lock().expect("fake page state poisoned");
        match &state.video {
            Some(video) if state.revealed && self.locators.segments[video.layout] == *layout => {
                video.segments.clone()
            }
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), ExtractionError> {
        let id = url.split("v=").nth(1).unwrap_or_default();
        let video = self
            .videos
            .get(id)
            .cloned()
            .unwrap_or_else(FakeVideo::unavailable);
        {
            let mut state = self.state.lock().expect("fake page state poisoned");
            // Reloading the same video keeps the remaining injected failures.
            if state.loaded.as_deref() != Some(id) {
                state.failures_left = video.fail_at.map(|(_, n)| n).unwrap_or(0);
                state.loaded = Some(id.to_string());
            }
            state.video = Some(video);
            state.polls = 0;
            state.revealed = false;
        }
        self.trip(FakeStage::Goto).await
    }

    async fn ready_state(&self) -> Result<ReadyState, ExtractionError> {
        let mut state = self.state.lock().expect("fake page state poisoned");
        state.polls += 1;
        let video = state.video.clone().unwrap_or_default();
        if !video.never_ready && state.polls > video.ready_after_polls {
            Ok(ReadyState::Complete)
        } else {
            Ok(ReadyState::Loading)
        }
    }

    async fn exists(&self, selector: &Selector) -> Result<bool, ExtractionError> {
        Ok(self.matches(selector))
    }

    async fn click(&self, selector: &Selector) -> Result<bool, ExtractionError> {
        if self.locators.expander.contains(selector) {
            self.trip(FakeStage::Expand).await?;
        }
        let is_reveal = self.locators.reveal.contains(selector);
        if is_reveal {
            self.trip(FakeStage::Reveal).await?;
        }
        let found = self.matches(selector);
        if found && is_reveal {
            self.state.lock().expect("fake page state poisoned").revealed = true;
        }
        Ok(found)
    }

    async fn count_segments(&self, layout: &SegmentLayout) -> Result<usize, ExtractionError> {
        self.trip(FakeStage::Panel).await?;
        Ok(self.rendered(layout).len())
    }

    async fn segment_nodes(
        &self,
        layout: &SegmentLayout,
    ) -> Result<Vec<RawSegmentNode>, ExtractionError> {
        self.trip(FakeStage::Parse).await?;
        Ok(self.rendered(layout))
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

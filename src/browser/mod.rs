use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod chromium;

#[cfg(test)]
pub(crate) mod fake;

use crate::ExtractionError;

/// `document.readyState` as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(value: &str) -> Self {
        match value {
            "interactive" => ReadyState::Interactive,
            "complete" => ReadyState::Complete,
            _ => ReadyState::Loading,
        }
    }

    /// The document is parsed and scripts may run against it
    pub fn is_interactive(&self) -> bool {
        matches!(self, ReadyState::Interactive | ReadyState::Complete)
    }
}

/// How labels are compared in [`Selector::Label`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    /// Whole label equals the needle, ignoring case and surrounding whitespace
    Exact,
    /// Label contains the needle, ignoring case
    Contains,
}

/// One way of finding an element on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Plain CSS selector, first match wins
    Css(String),
    /// Element among `scope` whose aria-label or visible text matches `label`
    Label {
        scope: String,
        label: String,
        mode: LabelMatch,
    },
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn label(scope: impl Into<String>, label: impl Into<String>, mode: LabelMatch) -> Self {
        Selector::Label {
            scope: scope.into(),
            label: label.into(),
            mode,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css({})", css),
            Selector::Label { scope, label, mode } => {
                write!(f, "label({} {:?} \"{}\")", scope, mode, label)
            }
        }
    }
}

/// Where segment nodes and their two sub-elements live in one panel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    pub name: &'static str,
    pub node: String,
    pub timestamp: String,
    pub text: String,
}

/// A segment node as read from the DOM, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegmentNode {
    pub timestamp: Option<String>,
    pub text: Option<String>,
}

impl RawSegmentNode {
    pub fn new(timestamp: &str, text: &str) -> Self {
        Self {
            timestamp: Some(timestamp.to_string()),
            text: Some(text.to_string()),
        }
    }
}

/// Page-level capabilities the navigation state machine and parser rely on
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Start navigating to `url`
    async fn goto(&self, url: &str) -> Result<(), ExtractionError>;

    /// Current ready state of the root document
    async fn ready_state(&self) -> Result<ReadyState, ExtractionError>;

    /// Whether the selector currently matches an element
    async fn exists(&self, selector: &Selector) -> Result<bool, ExtractionError>;

    /// Activate the matched element; `Ok(false)` when nothing matched
    async fn click(&self, selector: &Selector) -> Result<bool, ExtractionError>;

    /// Number of segment nodes currently rendered for the layout
    async fn count_segments(&self, layout: &SegmentLayout) -> Result<usize, ExtractionError>;

    /// Segment nodes in DOM order
    async fn segment_nodes(
        &self,
        layout: &SegmentLayout,
    ) -> Result<Vec<RawSegmentNode>, ExtractionError>;

    /// Close the page and free its isolated browsing context
    async fn close(&self) -> Result<(), ExtractionError>;
}

/// A running browser process that hands out isolated pages
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Open a page inside a fresh isolated context
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, ExtractionError>;

    /// Whether the process and its protocol connection are still up
    fn is_alive(&self) -> bool;

    /// Terminate the process
    async fn shutdown(&self) -> Result<(), ExtractionError>;
}

/// Starts browser processes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserBackend>, ExtractionError>;

    /// Engine name for logs
    fn engine_name(&self) -> &'static str;
}

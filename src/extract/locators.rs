//! Where things live on the watch page.
//!
//! Every lookup is an ordered list of strategies, tried first to last. Layout drift
//! should only ever need edits here.

use crate::browser::{LabelMatch, SegmentLayout, Selector};

#[derive(Debug, Clone)]
pub struct Locators {
    /// Markers of an unavailable, removed or private video
    pub not_found: Vec<Selector>,
    /// Metadata that only a playable watch page renders
    pub page_ready: Vec<Selector>,
    /// "...more" control that expands the description
    pub expander: Vec<Selector>,
    /// Control that opens the transcript panel
    pub reveal: Vec<Selector>,
    /// Known transcript panel layouts, newest first
    pub segments: Vec<SegmentLayout>,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            not_found: vec![
                Selector::css("ytd-player-error-message-renderer"),
                Selector::css("#error-screen yt-playability-error-supported-renderers:not([hidden])"),
                Selector::css("ytd-background-promo-renderer"),
            ],
            page_ready: vec![
                Selector::css("ytd-watch-metadata"),
                Selector::css("#above-the-fold #title"),
            ],
            expander: vec![
                Selector::css("#description-inline-expander"),
                Selector::css("tp-yt-paper-button#expand"),
                Selector::label("#description tp-yt-paper-button", "more", LabelMatch::Contains),
            ],
            reveal: vec![
                Selector::label("button", "Show transcript", LabelMatch::Exact),
                Selector::label("button, [role=button]", "transcript", LabelMatch::Contains),
                Selector::css("ytd-video-description-transcript-section-renderer button"),
            ],
            segments: vec![
                SegmentLayout {
                    name: "segment-view-model",
                    node: "transcript-segment-view-model".to_string(),
                    timestamp: ".ytwTranscriptSegmentViewModelTimestamp".to_string(),
                    text: "span.ytAttributedStringHost".to_string(),
                },
                SegmentLayout {
                    name: "segment-renderer",
                    node: "ytd-transcript-segment-renderer".to_string(),
                    timestamp: ".segment-timestamp".to_string(),
                    text: ".segment-text".to_string(),
                },
            ],
        }
    }
}

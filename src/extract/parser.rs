use crate::browser::{PageDriver, RawSegmentNode, SegmentLayout};
use crate::ExtractionError;

use super::retry::RetryPolicy;
use super::{Transcript, TranscriptSegment};

/// Reads the rendered transcript panel into segments
#[derive(Debug, Clone)]
pub struct SegmentParser {
    retry: RetryPolicy,
}

impl SegmentParser {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Read and validate the segment nodes of `layout`, in DOM order
    pub async fn read(
        &self,
        page: &dyn PageDriver,
        layout: &SegmentLayout,
    ) -> Result<Transcript, ExtractionError> {
        let nodes = self
            .retry
            .run("read segments", move || page.segment_nodes(layout))
            .await?;

        tracing::debug!("Read {} segment node(s) from {} layout", nodes.len(), layout.name);
        parse_segments(nodes)
    }
}

/// Turn raw nodes into segments. Nodes missing a timestamp or text are skipped;
/// order is never changed. No surviving segment means there is no usable transcript.
pub fn parse_segments(nodes: Vec<RawSegmentNode>) -> Result<Transcript, ExtractionError> {
    let total = nodes.len();
    let mut segments = Vec::with_capacity(total);

    for (index, node) in nodes.into_iter().enumerate() {
        match segment_from_node(node) {
            Some(segment) => segments.push(segment),
            None => tracing::warn!("Skipping malformed transcript segment #{}", index),
        }
    }

    if segments.is_empty() {
        return Err(ExtractionError::TranscriptNotFound(format!(
            "none of {} segment node(s) had both a timestamp and text",
            total
        )));
    }

    if segments.len() < total {
        tracing::info!("Parsed {} of {} segment node(s)", segments.len(), total);
    }

    Ok(Transcript::new(segments))
}

fn segment_from_node(node: RawSegmentNode) -> Option<TranscriptSegment> {
    let timestamp = node.timestamp?.trim().to_string();
    let text = node.text?.trim().to_string();

    if timestamp.is_empty() || text.is_empty() {
        return None;
    }

    Some(TranscriptSegment { timestamp, text })
}

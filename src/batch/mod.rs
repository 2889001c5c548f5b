use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::extract::{ExtractionResult, TranscriptExtractor, VideoId};
use crate::ErrorKind;

/// Runs the single-video pipeline over many ids with bounded concurrency
pub struct BatchOrchestrator {
    extractor: Arc<TranscriptExtractor>,
}

impl BatchOrchestrator {
    pub fn new(extractor: Arc<TranscriptExtractor>) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &TranscriptExtractor {
        &self.extractor
    }

    /// Extract every distinct id, at most `max_concurrency` at a time.
    /// The returned map has exactly one entry per distinct input id.
    pub async fn extract_many(
        &self,
        ids: &[VideoId],
        max_concurrency: usize,
    ) -> HashMap<VideoId, ExtractionResult> {
        self.extract_many_with_progress(ids, max_concurrency, |_, _| {})
            .await
    }

    /// Like [`Self::extract_many`], calling `on_done` as each video finishes
    pub async fn extract_many_with_progress<F>(
        &self,
        ids: &[VideoId],
        max_concurrency: usize,
        mut on_done: F,
    ) -> HashMap<VideoId, ExtractionResult>
    where
        F: FnMut(&VideoId, &ExtractionResult),
    {
        let unique = distinct_ids(ids);
        let limit = max_concurrency.max(1);
        tracing::info!(
            "Extracting {} video(s) with concurrency {}",
            unique.len(),
            limit
        );

        let extractor = &self.extractor;
        let mut pending = stream::iter(unique)
            .map(|id| async move {
                let result = extractor.extract(&id).await;
                (id, result)
            })
            .buffer_unordered(limit);

        let mut results = HashMap::new();
        while let Some((id, result)) = pending.next().await {
            on_done(&id, &result);
            results.insert(id, result);
        }
        results
    }
}

/// Distinct ids in first-seen order; this is the work list a batch actually runs
pub fn distinct_ids(ids: &[VideoId]) -> Vec<VideoId> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Aggregate of a batch run, serialized as the batch report
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: BTreeMap<VideoId, ExtractionResult>,
}

impl BatchSummary {
    pub fn new(results: HashMap<VideoId, ExtractionResult>) -> Self {
        let succeeded = results.values().filter(|r| r.is_success()).count();
        Self {
            generated_at: Utc::now(),
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results: results.into_iter().collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failure counts per kind, most frequent first
    pub fn failures_by_kind(&self) -> Vec<(ErrorKind, usize)> {
        let mut counts: HashMap<ErrorKind, usize> = HashMap::new();
        for kind in self.results.values().filter_map(|r| r.error_kind()) {
            *counts.entry(kind).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        counts
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

//! Question → ranked document spans.
//!
//! The [`Retriever`] embeds the question, over-fetches
//! `top_k × overfetch_factor` candidates from the [`VectorIndex`], resolves
//! them to active chunks of `Indexed` documents, collapses near-duplicate
//! spans, and truncates to `top_k`.
//!
//! Over-fetching matters during a re-ingestion swap: the old and new
//! versions of a document can both be in the index, and their unchanged
//! chunks sit at the same offsets. [`collapse_near_duplicates`] keeps only
//! the best-scoring span of each such group.
//!
//! Hits that no longer resolve (vectors of a version that was just
//! replaced, or of a document that is not `Indexed`) still use up search
//! slots. When that leaves fewer than the wanted spans and the index holds
//! more entries, the search is repeated with a doubled `k`. A document
//! still left with no resolving hits after the last search is scored
//! directly from its active chunks.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::capability::{with_retry, Embedder, RetryPolicy};
use crate::error::{QaError, Result};
use crate::index::{l2_normalize, VectorIndex};
use crate::models::{DocumentStatus, RetrievedSpan};
use crate::store::DocumentStore;

/// Searches per query before settling for what resolved.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// One search pass, resolved against the store.
struct Resolution {
    spans: Vec<RetrievedSpan>,
    /// `Indexed` documents (id, title) with hits of which none resolved.
    orphaned: Vec<(String, String)>,
    /// The search returned fewer than `k` hits.
    exhausted: bool,
}

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    /// Spans returned when the caller does not ask for a specific count.
    pub top_k: usize,
    /// Candidates fetched per requested span, to leave room for collapsing.
    pub overfetch_factor: usize,
    /// Spans of the same document whose start and end offsets are both
    /// within this many chars are treated as duplicates.
    pub dedup_distance: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            overfetch_factor: 3,
            dedup_distance: 32,
        }
    }
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(QaError::InvalidConfig("top_k must be >= 1".to_string()));
        }
        if self.overfetch_factor == 0 {
            return Err(QaError::InvalidConfig(
                "overfetch_factor must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embeds questions and searches the index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    params: RetrievalParams,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        params: RetrievalParams,
        retry: RetryPolicy,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            embedder,
            index,
            store,
            params,
            retry,
        })
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Retrieve up to `top_k` spans for `question`.
    ///
    /// # Errors
    ///
    /// [`QaError::EmbeddingUnavailable`] if the question cannot be embedded
    /// after retries. An empty corpus is not an error.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedSpan>> {
        self.retrieve_until(question, top_k, None).await
    }

    /// Like [`retrieve`](Self::retrieve) but never runs past `deadline`.
    pub async fn retrieve_until(
        &self,
        question: &str,
        top_k: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<RetrievedSpan>> {
        if top_k == 0 || question.trim().is_empty() || self.index.is_empty()? {
            return Ok(Vec::new());
        }

        let embedder = self.embedder.clone();
        let query_vec = with_retry("embedder", &self.retry, deadline, || {
            let embedder = embedder.clone();
            let text = question.to_string();
            async move { embedder.embed(&text).await }
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "question embedding failed");
            QaError::EmbeddingUnavailable(e.to_string())
        })?;

        if query_vec.len() != self.index.dims() {
            return Err(QaError::EmbeddingUnavailable(format!(
                "embedder returned {} dimensions, index expects {}",
                query_vec.len(),
                self.index.dims()
            )));
        }

        let fetch = top_k.saturating_mul(self.params.overfetch_factor);
        let mut k = fetch;
        let mut attempt = 1;
        let spans = loop {
            let pass = self.resolve(&query_vec, k).await?;
            let short = pass.spans.len() < fetch && !pass.exhausted;
            if (pass.orphaned.is_empty() && !short) || attempt >= MAX_RESOLVE_ATTEMPTS {
                let mut spans = pass.spans;
                for (doc_id, title) in &pass.orphaned {
                    spans.extend(self.score_active_chunks(&query_vec, doc_id, title).await?);
                }
                break spans;
            }
            if short {
                k = k.saturating_mul(2);
            }
            debug!(
                orphaned = pass.orphaned.len(),
                resolved = pass.spans.len(),
                k,
                attempt,
                "unresolved hits; searching again"
            );
            attempt += 1;
        };

        let fetched = spans.len();
        let mut spans = collapse_near_duplicates(spans, self.params.dedup_distance);
        spans.truncate(top_k);
        for (i, span) in spans.iter_mut().enumerate() {
            span.rank = i + 1;
        }
        debug!(fetched, returned = spans.len(), "retrieved spans");
        Ok(spans)
    }

    /// Search the index and resolve hits to active chunks of `Indexed`
    /// documents.
    ///
    /// Also lists the `Indexed` documents that had hits but none that
    /// resolved. That happens when a re-ingestion commits between the
    /// search and the chunk lookup; searching again finds the new version.
    async fn resolve(&self, query: &[f32], k: usize) -> Result<Resolution> {
        let hits = self.index.search(query, k)?;
        let exhausted = hits.len() < k;
        if hits.is_empty() {
            return Ok(Resolution {
                spans: Vec::new(),
                orphaned: Vec::new(),
                exhausted,
            });
        }

        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let chunks: HashMap<String, _> = self
            .store
            .get_chunks(&ids)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut indexed: HashMap<String, bool> = HashMap::new();
        let mut resolved_docs = HashSet::new();
        let mut unresolved_docs: HashMap<String, String> = HashMap::new();
        let mut spans = Vec::with_capacity(hits.len());
        for hit in hits {
            let doc_id = hit.metadata.document_id.clone();
            let Some(chunk) = chunks.get(&hit.chunk_id) else {
                // Swapped out, or not yet committed by the store.
                unresolved_docs
                    .entry(doc_id)
                    .or_insert_with(|| hit.metadata.title.clone());
                continue;
            };
            if !self.is_indexed(&doc_id, &mut indexed).await? {
                continue;
            }
            resolved_docs.insert(doc_id);
            spans.push(RetrievedSpan {
                chunk_id: hit.chunk_id,
                document_id: chunk.document_id.clone(),
                title: hit.metadata.title,
                text: chunk.text.clone(),
                start: chunk.start,
                end: chunk.end,
                score: hit.score,
                rank: 0,
            });
        }

        let mut orphaned = Vec::new();
        for (doc_id, title) in unresolved_docs {
            if !resolved_docs.contains(&doc_id) && self.is_indexed(&doc_id, &mut indexed).await? {
                orphaned.push((doc_id, title));
            }
        }
        orphaned.sort();
        Ok(Resolution {
            spans,
            orphaned,
            exhausted,
        })
    }

    /// Score a document's active chunks against `query` from their index
    /// entries, staged or not. Covers the moment after a commit when the
    /// new version's vectors are not yet published.
    async fn score_active_chunks(
        &self,
        query: &[f32],
        doc_id: &str,
        title: &str,
    ) -> Result<Vec<RetrievedSpan>> {
        let query = l2_normalize(query)?;
        let ids = self.store.active_chunk_ids(doc_id).await?;
        let chunks = self.store.get_chunks(&ids).await?;
        let mut spans = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let Some(entry) = self.index.get(&chunk.id)? else {
                continue;
            };
            let score: f32 = query.iter().zip(&entry.vector).map(|(a, b)| a * b).sum();
            spans.push(RetrievedSpan {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                title: title.to_string(),
                text: chunk.text,
                start: chunk.start,
                end: chunk.end,
                score,
                rank: 0,
            });
        }
        debug!(document_id = doc_id, scored = spans.len(), "scored active chunks directly");
        Ok(spans)
    }

    async fn is_indexed(&self, doc_id: &str, cache: &mut HashMap<String, bool>) -> Result<bool> {
        if let Some(v) = cache.get(doc_id) {
            return Ok(*v);
        }
        let v = self
            .store
            .get_document(doc_id)
            .await?
            .is_some_and(|d| d.status == DocumentStatus::Indexed);
        cache.insert(doc_id.to_string(), v);
        Ok(v)
    }
}

/// Collapse spans of the same document that sit within `max_distance`
/// chars of each other at both ends, keeping the highest-scoring one.
///
/// Output is ordered by descending score, ties by ascending chunk id.
pub fn collapse_near_duplicates(
    mut spans: Vec<RetrievedSpan>,
    max_distance: usize,
) -> Vec<RetrievedSpan> {
    spans.sort_by(by_relevance);

    let mut kept: Vec<RetrievedSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        let duplicate = kept.iter().any(|k| {
            k.document_id == span.document_id
                && k.start.abs_diff(span.start) <= max_distance
                && k.end.abs_diff(span.end) <= max_distance
        });
        if !duplicate {
            kept.push(span);
        }
    }
    kept
}

/// Order spans by descending score, ties by chunk id.
pub fn by_relevance(a: &RetrievedSpan, b: &RetrievedSpan) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

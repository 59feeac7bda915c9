//! The question-answering orchestrator.
//!
//! [`QaOrchestrator`] coordinates ingestion, answering, and deletion while
//! keeping the [`DocumentStore`] and the [`VectorIndex`] consistent.
//!
//! # Ingestion
//!
//! Each attempt is an [`IngestAttempt`] moving through
//! `Pending → Indexing → Indexed` or `Pending → Indexing → Failed`:
//!
//! 1. Decode and hash the payload. Identical content for an `Indexed`
//!    document is a no-op.
//! 2. Chunk, embed every chunk, and stage the chunks in both the store and
//!    the index. Staged chunks and vectors are invisible to retrieval.
//! 3. Commit: the store activates the new chunks, marks the document
//!    `Indexed`, and deletes the previous version's chunks in one step.
//!    The new vectors are then published and the old ones evicted.
//!
//! Any failure in step 2 or 3 rolls back exactly what the attempt wrote.
//! So does dropping the `ingest` future before it finishes: the vectors go
//! at once, and the store cleanup runs on a spawned task that holds the
//! document's in-flight slot until it is done. A document that was
//! already `Indexed` keeps its previous version.
//!
//! # Answering
//!
//! [`ask`](QaOrchestrator::ask) never fails: every error on the query path
//! becomes a fallback [`Answer`] with no citations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capability::{with_retry, AnswerGenerator, Embedder, RetryPolicy};
use crate::chunk::{chunk_text, sha256_hex, ChunkConfig};
use crate::citation::check_citations;
use crate::context::{assemble, build_prompt, AssembledContext};
use crate::decode::{ContentDecoder, PlainTextDecoder};
use crate::error::{QaError, Result};
use crate::index::VectorIndex;
use crate::models::{
    Answer, Chunk, DeleteAck, Document, DocumentStatus, EntryMetadata, FallbackReason,
    IngestOutcome, IngestRequest, IngestStatus,
};
use crate::retrieve::{RetrievalParams, Retriever};
use crate::store::DocumentStore;

/// Texts sent to the embedder per call during ingestion.
const EMBED_BATCH_SIZE: usize = 32;

/// Tuning for a [`QaOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalParams,
    /// Context budget in chars.
    pub max_context_size: usize,
    pub embed_retry: RetryPolicy,
    pub generate_retry: RetryPolicy,
    /// Time budget for `ask` when the caller gives none.
    pub ask_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            retrieval: RetrievalParams::default(),
            max_context_size: 6000,
            embed_retry: RetryPolicy::default(),
            generate_retry: RetryPolicy::default(),
            ask_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        if self.max_context_size == 0 {
            return Err(QaError::InvalidConfig(
                "max_context_size must be greater than zero".to_string(),
            ));
        }
        if self.ask_timeout.is_zero() {
            return Err(QaError::InvalidConfig(
                "ask timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Phase of a single ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Pending,
    Indexing,
    Indexed,
    Failed,
}

impl AttemptPhase {
    fn can_move_to(self, next: AttemptPhase) -> bool {
        matches!(
            (self, next),
            (AttemptPhase::Pending, AttemptPhase::Indexing)
                | (AttemptPhase::Pending, AttemptPhase::Failed)
                | (AttemptPhase::Indexing, AttemptPhase::Indexed)
                | (AttemptPhase::Indexing, AttemptPhase::Failed)
        )
    }
}

/// Everything one ingestion attempt has written, so it can be undone.
///
/// Dropped before reaching `Indexed` or `Failed`, it rolls itself back.
pub struct IngestAttempt {
    document_id: String,
    phase: AttemptPhase,
    has_live_version: bool,
    /// The document record was (possibly) written by this attempt.
    wrote_record: bool,
    staged: Vec<String>,
    upserted: Vec<String>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    claim: Option<InFlightGuard>,
}

impl IngestAttempt {
    fn new(
        document_id: &str,
        has_live_version: bool,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        claim: Option<InFlightGuard>,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            phase: AttemptPhase::Pending,
            has_live_version,
            wrote_record: false,
            staged: Vec::new(),
            upserted: Vec::new(),
            index,
            store,
            claim,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    fn advance(&mut self, next: AttemptPhase) -> Result<()> {
        if !self.phase.can_move_to(next) {
            return Err(QaError::Storage(format!(
                "invalid ingestion transition {:?} -> {:?} for '{}'",
                self.phase, next, self.document_id
            )));
        }
        debug!(document_id = %self.document_id, from = ?self.phase, to = ?next, "ingestion phase");
        self.phase = next;
        Ok(())
    }

    /// Remove this attempt's vectors and staged chunks.
    ///
    /// Safe to call more than once: entries already rolled back are
    /// forgotten, and entries that failed to roll back are kept for the
    /// next call.
    async fn rollback(&mut self) {
        self.evict_vectors();
        if !self.staged.is_empty() {
            match self.store.discard_chunks(&self.staged).await {
                Ok(()) => self.staged.clear(),
                Err(e) => warn!(
                    document_id = %self.document_id,
                    error = %e,
                    "rollback: failed to discard staged chunks"
                ),
            }
        }
    }

    fn evict_vectors(&mut self) {
        let mut kept = Vec::new();
        for id in self.upserted.drain(..) {
            if let Err(e) = self.index.remove(&id) {
                warn!(chunk_id = %id, error = %e, "rollback: failed to evict vector");
                kept.push(id);
            }
        }
        self.upserted = kept;
    }

    /// Status the document is left in when this attempt does not finish.
    fn failed_status(&self) -> DocumentStatus {
        if self.has_live_version {
            DocumentStatus::Indexed
        } else {
            DocumentStatus::Failed
        }
    }
}

impl Drop for IngestAttempt {
    fn drop(&mut self) {
        if matches!(self.phase, AttemptPhase::Indexed | AttemptPhase::Failed) {
            return;
        }
        warn!(document_id = %self.document_id, phase = ?self.phase, "ingestion cancelled; rolling back");
        self.evict_vectors();

        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() && !self.wrote_record {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(document_id = %self.document_id, "no runtime for cleanup; left for the next hydrate");
            return;
        };

        let store = self.store.clone();
        let document_id = self.document_id.clone();
        let status = self.failed_status();
        let wrote_record = self.wrote_record;
        // The slot stays claimed until the store is clean again.
        let claim = self.claim.take();
        runtime.spawn(async move {
            let _claim = claim;
            if !staged.is_empty() {
                if let Err(e) = store.discard_chunks(&staged).await {
                    warn!(document_id = %document_id, error = %e, "cleanup: failed to discard staged chunks");
                }
            }
            if wrote_record {
                if let Err(e) = store
                    .set_status(&document_id, status, Some("ingestion cancelled"))
                    .await
                {
                    debug!(document_id = %document_id, error = %e, "cleanup: could not record cancellation");
                }
            }
        });
    }
}

/// Releases a document's in-flight slot on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

/// Coordinates ingestion, answering, and deletion.
///
/// Share it behind an [`Arc`]; every operation takes `&self`. Operations on
/// different documents and all queries run concurrently. A second
/// ingestion or deletion of a document that is already being ingested is
/// rejected with [`QaError::IngestionInProgress`].
pub struct QaOrchestrator {
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn AnswerGenerator>,
    decoder: Arc<dyn ContentDecoder>,
    retriever: Retriever,
    config: OrchestratorConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl QaOrchestrator {
    /// # Errors
    ///
    /// [`QaError::InvalidConfig`] if `config` is invalid or the embedder
    /// and index disagree on dimensionality.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dims() != index.dims() {
            return Err(QaError::InvalidConfig(format!(
                "embedder '{}' produces {} dimensions but the index holds {}",
                embedder.model_name(),
                embedder.dims(),
                index.dims()
            )));
        }
        let retriever = Retriever::new(
            embedder.clone(),
            index.clone(),
            store.clone(),
            config.retrieval,
            config.embed_retry.clone(),
        )?;
        Ok(Self {
            store,
            index,
            embedder,
            generator,
            decoder: Arc::new(PlainTextDecoder),
            retriever,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Replace the default UTF-8 decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn ContentDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Rebuild the index from the store after a restart.
    ///
    /// Purges staged chunks left by interrupted ingestions, marks documents
    /// that never finished their first ingestion as `Failed`, and upserts
    /// every committed chunk. Returns the number of vectors loaded.
    ///
    /// # Errors
    ///
    /// [`QaError::DimensionMismatch`] if a stored vector does not fit the
    /// index, which means the embedder changed since it was written.
    pub async fn hydrate(&self) -> Result<usize> {
        let purged = self.store.purge_staged().await?;
        if purged > 0 {
            info!(purged, "purged staged chunks from interrupted ingestions");
        }

        for doc in self.store.list_documents().await? {
            if matches!(doc.status, DocumentStatus::Pending | DocumentStatus::Indexing) {
                warn!(document_id = %doc.id, "ingestion was interrupted; marking failed");
                self.store
                    .set_status(&doc.id, DocumentStatus::Failed, Some("ingestion interrupted"))
                    .await?;
            }
        }

        let mut loaded = 0usize;
        for committed in self.store.committed_chunks().await? {
            let chunk = committed.chunk;
            let Some(vector) = chunk.embedding.as_deref() else {
                warn!(chunk_id = %chunk.id, "committed chunk has no embedding; skipping");
                continue;
            };
            let metadata = EntryMetadata {
                document_id: chunk.document_id.clone(),
                title: committed.title,
            };
            match self.index.upsert(&chunk.id, vector, metadata) {
                Ok(()) => loaded += 1,
                Err(e @ QaError::DimensionMismatch { .. }) => {
                    error!(chunk_id = %chunk.id, error = %e, "stored vector does not fit the index");
                    return Err(e);
                }
                Err(e) => warn!(chunk_id = %chunk.id, error = %e, "skipping stored vector"),
            }
        }
        info!(vectors = loaded, "index hydrated");
        Ok(loaded)
    }

    fn claim(&self, document_id: &str) -> Result<InFlightGuard> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| QaError::Storage("in-flight registry lock poisoned".to_string()))?;
        if !set.insert(document_id.to_string()) {
            return Err(QaError::IngestionInProgress(document_id.to_string()));
        }
        Ok(InFlightGuard {
            set: self.in_flight.clone(),
            id: document_id.to_string(),
        })
    }

    /// Whether an ingestion or deletion of `document_id` is running.
    pub fn is_in_flight(&self, document_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(document_id))
            .unwrap_or(false)
    }

    /// Ingest or re-ingest a document.
    ///
    /// Decode failures yield [`IngestStatus::Rejected`]; embedding, index,
    /// or storage failures yield [`IngestStatus::Failed`] with the reason,
    /// after the attempt has been rolled back.
    ///
    /// # Errors
    ///
    /// [`QaError::IngestionInProgress`] if the document is already being
    /// ingested or deleted.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let document_id = request.document_id.trim().to_string();
        if document_id.is_empty() {
            return Ok(outcome(
                &request.document_id,
                IngestStatus::Rejected,
                Some("document id must not be empty".to_string()),
                0,
            ));
        }
        // Ids appear verbatim inside citation markers.
        if document_id
            .chars()
            .any(|c| c.is_whitespace() || c == '[' || c == ']')
        {
            return Ok(rejected(
                &document_id,
                "document id must not contain whitespace or brackets",
            ));
        }

        let guard = self.claim(&document_id)?;

        let content = match self.decoder.decode(&request.bytes, &request.content_type) {
            Ok(text) if text.trim().is_empty() => {
                return Ok(rejected(&document_id, "document has no text content"));
            }
            Ok(text) => text,
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "rejecting undecodable document");
                return Ok(rejected(&document_id, &e.to_string()));
            }
        };

        let content_hash = sha256_hex(&content);
        let previous = self.store.get_document(&document_id).await?;
        let has_live_version = previous
            .as_ref()
            .is_some_and(|d| d.status == DocumentStatus::Indexed);

        if let Some(prev) = previous.as_ref().filter(|_| has_live_version) {
            if prev.content_hash == content_hash && prev.title == request.title {
                let chunks = self.store.active_chunk_ids(&document_id).await?.len();
                info!(document_id = %document_id, "content unchanged; skipping");
                return Ok(outcome(&document_id, IngestStatus::Unchanged, None, chunks));
            }
        }

        let doc = Document {
            id: document_id.clone(),
            title: request.title,
            content,
            content_type: request.content_type,
            content_hash,
            ingested_at: chrono::Utc::now().timestamp(),
            status: DocumentStatus::Pending,
            last_error: None,
        };

        let mut attempt = IngestAttempt::new(
            &document_id,
            has_live_version,
            self.index.clone(),
            self.store.clone(),
            Some(guard),
        );
        match self.run_attempt(&mut attempt, &doc).await {
            Ok(chunks) => {
                info!(document_id = %document_id, chunks, "document indexed");
                Ok(outcome(&document_id, IngestStatus::Accepted, None, chunks))
            }
            Err(e) => {
                let reason = e.to_string();
                error!(document_id = %document_id, error = %reason, "ingestion failed; rolling back");
                attempt.rollback().await;

                // The previous version, if any, stays authoritative.
                if let Err(e) = self
                    .store
                    .set_status(&document_id, attempt.failed_status(), Some(&reason))
                    .await
                {
                    warn!(document_id = %document_id, error = %e, "could not record ingestion failure");
                }
                if let Err(e) = attempt.advance(AttemptPhase::Failed) {
                    warn!(error = %e, "ingestion failed after commit");
                }

                let chunks = if has_live_version {
                    self.store
                        .active_chunk_ids(&document_id)
                        .await
                        .map(|ids| ids.len())
                        .unwrap_or(0)
                } else {
                    0
                };
                Ok(outcome(&document_id, IngestStatus::Failed, Some(reason), chunks))
            }
        }
    }

    async fn run_attempt(&self, attempt: &mut IngestAttempt, doc: &Document) -> Result<usize> {
        // A live version keeps its record untouched until commit so that
        // queries keep seeing it.
        if !attempt.has_live_version {
            attempt.wrote_record = true;
            self.store.put_document(doc).await?;
            self.store
                .set_status(&doc.id, DocumentStatus::Indexing, None)
                .await?;
        }
        attempt.advance(AttemptPhase::Indexing)?;

        let mut chunks = chunk_text(&doc.id, &doc.content, &self.config.chunking)?;
        self.embed_chunks(&mut chunks).await?;

        attempt.staged = chunks.iter().map(|c| c.id.clone()).collect();
        self.store.stage_chunks(&chunks).await?;

        for chunk in &chunks {
            let Some(vector) = chunk.embedding.as_deref() else {
                return Err(QaError::Capability {
                    capability: "embedder",
                    message: format!("chunk {} was not embedded", chunk.chunk_index),
                });
            };
            let metadata = EntryMetadata {
                document_id: doc.id.clone(),
                title: doc.title.clone(),
            };
            self.index.stage(&chunk.id, vector, metadata)?;
            attempt.upserted.push(chunk.id.clone());
        }

        let removed = self.store.commit(doc, &attempt.staged).await?;
        attempt.advance(AttemptPhase::Indexed)?;
        attempt.staged.clear();
        let published = std::mem::take(&mut attempt.upserted);
        if let Err(e) = self.index.publish(&published) {
            error!(document_id = %doc.id, error = %e, "committed vectors could not be published");
        }

        for id in &removed {
            if let Err(e) = self.index.remove(id) {
                // The store no longer resolves this id, so it cannot surface.
                warn!(chunk_id = %id, error = %e, "failed to evict replaced vector");
            }
        }
        if !removed.is_empty() {
            debug!(document_id = %doc.id, replaced = removed.len(), "swapped document version");
        }

        Ok(chunks.len())
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        let dims = self.index.dims();
        for batch in chunks.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedder = self.embedder.clone();
            let vectors = with_retry("embedder", &self.config.embed_retry, None, || {
                let embedder = embedder.clone();
                let texts = texts.clone();
                async move { embedder.embed_batch(&texts).await }
            })
            .await?;

            if vectors.len() != batch.len() {
                return Err(QaError::Capability {
                    capability: "embedder",
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                });
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                if vector.len() != dims {
                    return Err(QaError::DimensionMismatch {
                        expected: dims,
                        actual: vector.len(),
                    });
                }
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }

    /// Answer a question from the indexed documents.
    ///
    /// Always returns within `timeout` (or the configured default). On
    /// failure the answer is a fallback with no citations; if generation
    /// was what failed, the assembled context is attached so the caller can
    /// retry with [`answer_from_context`](Self::answer_from_context).
    pub async fn ask(
        &self,
        question: &str,
        conversation: Option<&str>,
        timeout: Option<Duration>,
    ) -> Answer {
        let deadline = Instant::now() + timeout.unwrap_or(self.config.ask_timeout);
        let top_k = self.config.retrieval.top_k;

        let retrieved = tokio::time::timeout_at(
            deadline,
            self.retriever.retrieve_until(question, top_k, Some(deadline)),
        )
        .await;

        let spans = match retrieved {
            // The embedder's own timeout can expire at the deadline first.
            Err(_) | Ok(Err(_)) if Instant::now() >= deadline => {
                warn!("question timed out during retrieval");
                return Answer::fallback(FallbackReason::TimedOut, None);
            }
            Ok(Err(QaError::EmbeddingUnavailable(msg))) => {
                return Answer::fallback(FallbackReason::EmbeddingUnavailable(msg), None);
            }
            Ok(Err(e)) => {
                error!(error = %e, "retrieval failed");
                return Answer::fallback(FallbackReason::RetrievalFailed(e.to_string()), None);
            }
            Ok(Ok(spans)) => spans,
            Err(_) => return Answer::fallback(FallbackReason::TimedOut, None),
        };

        if spans.is_empty() {
            return Answer::fallback(FallbackReason::NoDocuments, None);
        }

        let context = assemble(&spans, self.config.max_context_size);
        if context.is_empty() {
            return Answer::fallback(FallbackReason::NoContext, None);
        }

        self.generate(question, context, conversation, deadline).await
    }

    /// Generate an answer from an already assembled context, skipping
    /// retrieval.
    pub async fn answer_from_context(
        &self,
        question: &str,
        context: AssembledContext,
        conversation: Option<&str>,
        timeout: Option<Duration>,
    ) -> Answer {
        if context.is_empty() {
            return Answer::fallback(FallbackReason::NoContext, None);
        }
        let deadline = Instant::now() + timeout.unwrap_or(self.config.ask_timeout);
        self.generate(question, context, conversation, deadline).await
    }

    async fn generate(
        &self,
        question: &str,
        context: AssembledContext,
        conversation: Option<&str>,
        deadline: Instant,
    ) -> Answer {
        let prompt = build_prompt(question, &context, conversation);
        let generator = self.generator.clone();
        let generated = tokio::time::timeout_at(
            deadline,
            with_retry("generator", &self.config.generate_retry, Some(deadline), || {
                let generator = generator.clone();
                let prompt = prompt.clone();
                async move { generator.generate(&prompt).await }
            }),
        )
        .await;

        let text = match generated {
            Ok(Ok(text)) => text,
            Ok(Err(QaError::CapabilityTimeout { .. })) | Err(_) if Instant::now() >= deadline => {
                warn!("question timed out during generation");
                return Answer::fallback(FallbackReason::TimedOut, Some(context));
            }
            Ok(Err(e)) => {
                error!(generator = generator.name(), error = %e, "answer generation failed");
                return Answer::fallback(
                    FallbackReason::GenerationFailed(e.to_string()),
                    Some(context),
                );
            }
            Err(_) => return Answer::fallback(FallbackReason::TimedOut, Some(context)),
        };

        let checked = check_citations(&text, &context);
        if checked.text.is_empty() {
            return Answer::fallback(
                FallbackReason::GenerationFailed("generator returned an empty answer".to_string()),
                Some(context),
            );
        }
        if !checked.stripped.is_empty() {
            debug!(stripped = checked.stripped.len(), "removed hallucinated citations");
        }

        Answer {
            text: checked.text,
            citations: checked.citations,
            confidence: checked.confidence,
            fallback: None,
            context: Some(context),
        }
    }

    /// Delete a document, its chunks, and its vectors.
    ///
    /// # Errors
    ///
    /// [`QaError::IngestionInProgress`] if the document is being ingested.
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteAck> {
        let _guard = self.claim(document_id)?;

        let Some(removed) = self.store.delete_document(document_id).await? else {
            return Ok(DeleteAck::NotFound);
        };
        for id in &removed {
            self.index.remove(id)?;
        }
        // Catch vectors the store no longer knew about.
        let stray = self.index.remove_document(document_id)?;
        if stray > 0 {
            debug!(document_id, stray, "evicted vectors without stored chunks");
        }

        info!(document_id, chunks = removed.len(), "document deleted");
        Ok(DeleteAck::Deleted {
            chunks_removed: removed.len(),
        })
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        self.store.list_documents().await
    }

    pub async fn document(&self, document_id: &str) -> Result<Option<Document>> {
        self.store.get_document(document_id).await
    }

    /// Number of vectors currently in the index.
    pub fn indexed_vectors(&self) -> Result<usize> {
        self.index.len()
    }
}

fn outcome(
    document_id: &str,
    status: IngestStatus,
    reason: Option<String>,
    chunks: usize,
) -> IngestOutcome {
    IngestOutcome {
        document_id: document_id.to_string(),
        status,
        reason,
        chunks,
    }
}

fn rejected(document_id: &str, reason: &str) -> IngestOutcome {
    outcome(
        document_id,
        IngestStatus::Rejected,
        Some(reason.to_string()),
        0,
    )
}

//! Core data models used throughout docqa.
//!
//! These types represent the documents, chunks, index entries, and
//! answers that flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::AssembledContext;
use crate::error::QaError;

/// Lifecycle state of a document.
///
/// `Pending → Indexing → Indexed` or `Pending → Indexing → Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Indexing => "indexing",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "indexing" => Ok(DocumentStatus::Indexing),
            "indexed" => Ok(DocumentStatus::Indexed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(QaError::Storage(format!("unknown document status '{}'", other))),
        }
    }
}

/// A document owned by the [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Decoded text content.
    pub content: String,
    pub content_type: String,
    /// SHA-256 of `content`, hex encoded.
    pub content_hash: String,
    /// Unix timestamp (seconds) of the last successful or attempted ingestion.
    pub ingested_at: i64,
    pub status: DocumentStatus,
    /// Reason for the most recent failed ingestion attempt, if any.
    pub last_error: Option<String>,
}

/// A bounded span of a document, the unit of embedding and retrieval.
///
/// Offsets are measured in chars (Unicode scalar values) into the
/// document's decoded content, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    /// Embedding vector, absent until computed.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Length of the span in chars.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Metadata snapshot stored next to each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub document_id: String,
    pub title: String,
}

/// A vector index entry. The vector is L2-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A chunk retrieved for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedSpan {
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Cosine similarity to the question.
    pub score: f32,
    /// 1-based position in the final result list.
    pub rank: usize,
}

impl RetrievedSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A reference from an answer to a document span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub start: usize,
    pub end: usize,
}

impl Citation {
    /// The marker text used in prompts and generated answers.
    pub fn marker(&self) -> String {
        format!("[doc:{}:{}-{}]", self.document_id, self.start, self.end)
    }
}

/// Why an answer is a fallback rather than a grounded generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Nothing has been ingested, or nothing matched.
    NoDocuments,
    /// Spans were retrieved but none fit the context budget.
    NoContext,
    /// The question could not be embedded.
    EmbeddingUnavailable(String),
    /// Search or chunk lookup failed.
    RetrievalFailed(String),
    /// The generator failed after retries.
    GenerationFailed(String),
    /// The caller's time budget ran out.
    TimedOut,
}

impl FallbackReason {
    /// User-facing text for the fallback answer.
    pub fn message(&self) -> &'static str {
        match self {
            FallbackReason::NoDocuments => {
                "I cannot answer that: no indexed documents contain relevant information."
            }
            FallbackReason::NoContext => {
                "I cannot answer that: the relevant passages are too large to use as context."
            }
            FallbackReason::EmbeddingUnavailable(_) => {
                "I cannot answer right now: the document search service is unavailable."
            }
            FallbackReason::RetrievalFailed(_) => {
                "I cannot answer right now: the documents could not be searched."
            }
            FallbackReason::GenerationFailed(_) => {
                "I cannot answer right now: the answering service is unavailable."
            }
            FallbackReason::TimedOut => "I cannot answer that within the time allowed.",
        }
    }
}

/// The result of a question. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Highest relevance score among cited spans, `0.0` for fallbacks.
    pub confidence: f32,
    /// Set when the answer is not a grounded generation.
    pub fallback: Option<FallbackReason>,
    /// Context assembled before generation, kept so a caller can retry
    /// generation without re-running retrieval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<AssembledContext>,
}

impl Answer {
    pub fn fallback(reason: FallbackReason, context: Option<AssembledContext>) -> Self {
        Self {
            text: reason.message().to_string(),
            citations: Vec::new(),
            confidence: 0.0,
            fallback: Some(reason),
            context,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// A raw ingestion request from the file-handling layer.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub document_id: String,
    pub title: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Result status of an ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// New content was chunked, embedded, indexed, and committed.
    Accepted,
    /// Content and title match the indexed version; nothing was done.
    Unchanged,
    /// The payload could not be decoded to text.
    Rejected,
    /// Embedding or indexing failed; the last indexed version is intact.
    Failed,
}

/// Outcome reported to the caller of `ingest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub status: IngestStatus,
    pub reason: Option<String>,
    /// Number of chunks now indexed for the document.
    pub chunks: usize,
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, IngestStatus::Accepted | IngestStatus::Unchanged)
    }
}

/// Acknowledgement for `delete_document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeleteAck {
    Deleted { chunks_removed: usize },
    NotFound,
}

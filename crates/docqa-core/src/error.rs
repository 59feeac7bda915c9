//! Error taxonomy shared by every docqa component.

use thiserror::Error;

/// Errors raised by the question-answering core.
///
/// Only some of these ever reach an end user: query-path failures are
/// converted into fallback [`Answer`](crate::models::Answer)s by the
/// orchestrator, and [`QaError::HallucinatedCitation`] is recovered
/// locally by stripping the offending marker.
#[derive(Debug, Error)]
pub enum QaError {
    /// Bad chunking, retrieval, or index parameters. Not retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An embedder or answer generator call failed.
    #[error("{capability} capability failed: {message}")]
    Capability {
        /// `"embedder"` or `"generator"`.
        capability: &'static str,
        message: String,
    },

    /// A capability call did not complete within its time budget.
    #[error("{capability} capability timed out after {after_ms} ms")]
    CapabilityTimeout {
        capability: &'static str,
        after_ms: u64,
    },

    /// Another ingestion or deletion of the same document is in flight.
    #[error("ingestion already in progress for document '{0}'")]
    IngestionInProgress(String),

    /// A generated answer cited a marker that was not in its context.
    #[error("answer cited unknown marker {0}")]
    HallucinatedCitation(String),

    /// The question could not be embedded, so nothing can be retrieved.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A vector's length differs from the index dimensionality.
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A zero or non-finite vector cannot be L2-normalized.
    #[error("vector cannot be normalized (zero or non-finite components)")]
    DegenerateVector,

    #[error("not found: {0}")]
    NotFound(String),

    /// The payload could not be decoded to text.
    #[error("could not decode document: {0}")]
    Decode(String),

    /// Failure inside a [`DocumentStore`](crate::store::DocumentStore) backend.
    #[error("storage error: {0}")]
    Storage(String),
}

impl QaError {
    /// Whether the orchestrator should retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QaError::Capability { .. } | QaError::CapabilityTimeout { .. }
        )
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        QaError::Storage(err.to_string())
    }
}

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, QaError>;

//! Storage abstraction for documents and their chunks.
//!
//! The [`DocumentStore`] trait owns raw document content and chunk
//! provenance. Chunks pass through two states:
//!
//! - **staged**: written during an ingestion attempt, invisible to reads;
//! - **active**: made visible by [`commit`](DocumentStore::commit), which
//!   in the same step marks the document `Indexed` and drops every other
//!   chunk of that document.
//!
//! This lets the orchestrator write a new version beside the old one and
//! swap atomically, or throw the staged chunks away on failure.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document, DocumentStatus};

/// An active chunk together with the title of its document, used to
/// rebuild the vector index after a restart.
#[derive(Debug, Clone)]
pub struct CommittedChunk {
    pub chunk: Chunk,
    pub title: String,
}

/// Abstract storage backend for documents and chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_document`](DocumentStore::put_document) | Insert or replace a document record |
/// | [`set_status`](DocumentStore::set_status) | Update lifecycle status and failure reason |
/// | [`stage_chunks`](DocumentStore::stage_chunks) | Write chunks for an in-flight ingestion |
/// | [`discard_chunks`](DocumentStore::discard_chunks) | Roll back staged chunks |
/// | [`commit`](DocumentStore::commit) | Activate staged chunks and mark the document indexed |
/// | [`get_chunks`](DocumentStore::get_chunks) | Fetch active chunks by id |
/// | [`delete_document`](DocumentStore::delete_document) | Remove a document and all its chunks |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, ordered by id.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn put_document(&self, doc: &Document) -> Result<()>;

    /// Fails with [`QaError::NotFound`](crate::QaError::NotFound) if the
    /// document does not exist.
    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// Write chunks as staged. Staged chunks are never returned by
    /// [`get_chunks`](DocumentStore::get_chunks).
    async fn stage_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Remove the given chunks whatever their state. Unknown ids are ignored.
    async fn discard_chunks(&self, chunk_ids: &[String]) -> Result<()>;

    /// Atomically store `doc` with status `Indexed`, activate `active`, and
    /// delete every other chunk of the document.
    ///
    /// Returns the ids of the chunks that were deleted.
    async fn commit(&self, doc: &Document, active: &[String]) -> Result<Vec<String>>;

    /// Ids of the active chunks of a document, in chunk order.
    async fn active_chunk_ids(&self, document_id: &str) -> Result<Vec<String>>;

    /// Active chunks with the given ids. Missing or staged ids are skipped.
    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>>;

    /// Delete a document and all its chunks. Returns the removed chunk ids,
    /// or `None` if the document did not exist.
    async fn delete_document(&self, id: &str) -> Result<Option<Vec<String>>>;

    /// Active, embedded chunks of every `Indexed` document.
    async fn committed_chunks(&self) -> Result<Vec<CommittedChunk>>;

    /// Drop staged chunks left behind by an interrupted ingestion.
    async fn purge_staged(&self) -> Result<usize>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use docqa_core::store::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_blob_ignores_trailing_partial_float() {
        let mut blob = vec_to_blob(&[1.0]);
        blob.push(7);
        assert_eq!(blob_to_vec(&blob), vec![1.0]);
    }
}

//! In-memory [`DocumentStore`] for tests and embedded use.
//!
//! Documents and chunks live in `HashMap`s behind `std::sync::RwLock`.
//! `commit` takes both write locks (documents first, then chunks) so the
//! status flip and the chunk swap are observed together.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{QaError, Result};
use crate::models::{Chunk, Document, DocumentStatus};

use super::{CommittedChunk, DocumentStore};

struct StoredChunk {
    chunk: Chunk,
    active: bool,
}

/// In-memory document store.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<HashMap<String, StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> QaError {
    QaError::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let mut all: Vec<Document> = docs.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn put_document(&self, doc: &Document) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| QaError::NotFound(id.to_string()))?;
        doc.status = status;
        doc.last_error = last_error.map(str::to_string);
        Ok(())
    }

    async fn stage_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        for c in chunks {
            stored.insert(
                c.id.clone(),
                StoredChunk {
                    chunk: c.clone(),
                    active: false,
                },
            );
        }
        Ok(())
    }

    async fn discard_chunks(&self, chunk_ids: &[String]) -> Result<()> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        for id in chunk_ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn commit(&self, doc: &Document, active: &[String]) -> Result<Vec<String>> {
        let keep: HashSet<&str> = active.iter().map(String::as_str).collect();
        let mut docs = self.docs.write().map_err(poisoned)?;
        let mut stored = self.chunks.write().map_err(poisoned)?;

        for id in active {
            match stored.get_mut(id) {
                Some(sc) if sc.chunk.document_id == doc.id => sc.active = true,
                _ => {
                    return Err(QaError::Storage(format!(
                        "cannot commit unknown chunk '{}' for document '{}'",
                        id, doc.id
                    )))
                }
            }
        }

        let removed: Vec<String> = stored
            .iter()
            .filter(|(id, sc)| sc.chunk.document_id == doc.id && !keep.contains(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            stored.remove(id);
        }

        let mut committed = doc.clone();
        committed.status = DocumentStatus::Indexed;
        committed.last_error = None;
        docs.insert(committed.id.clone(), committed);

        Ok(removed)
    }

    async fn active_chunk_ids(&self, document_id: &str) -> Result<Vec<String>> {
        let stored = self.chunks.read().map_err(poisoned)?;
        let mut chunks: Vec<&Chunk> = stored
            .values()
            .filter(|sc| sc.active && sc.chunk.document_id == document_id)
            .map(|sc| &sc.chunk)
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks.into_iter().map(|c| c.id.clone()).collect())
    }

    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        let stored = self.chunks.read().map_err(poisoned)?;
        Ok(chunk_ids
            .iter()
            .filter_map(|id| stored.get(id))
            .filter(|sc| sc.active)
            .map(|sc| sc.chunk.clone())
            .collect())
    }

    async fn delete_document(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let mut stored = self.chunks.write().map_err(poisoned)?;
        if docs.remove(id).is_none() {
            return Ok(None);
        }
        let removed: Vec<String> = stored
            .iter()
            .filter(|(_, sc)| sc.chunk.document_id == id)
            .map(|(cid, _)| cid.clone())
            .collect();
        for cid in &removed {
            stored.remove(cid);
        }
        Ok(Some(removed))
    }

    async fn committed_chunks(&self) -> Result<Vec<CommittedChunk>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let stored = self.chunks.read().map_err(poisoned)?;
        let mut out: Vec<CommittedChunk> = stored
            .values()
            .filter(|sc| sc.active && sc.chunk.embedding.is_some())
            .filter_map(|sc| {
                let doc = docs.get(&sc.chunk.document_id)?;
                (doc.status == DocumentStatus::Indexed).then(|| CommittedChunk {
                    chunk: sc.chunk.clone(),
                    title: doc.title.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| {
            a.chunk
                .document_id
                .cmp(&b.chunk.document_id)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        Ok(out)
    }

    async fn purge_staged(&self) -> Result<usize> {
        let mut stored = self.chunks.write().map_err(poisoned)?;
        let before = stored.len();
        stored.retain(|_, sc| sc.active);
        Ok(before - stored.len())
    }
}

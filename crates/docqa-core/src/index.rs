//! Vector index over chunk embeddings.
//!
//! [`VectorIndex`] is the only shared mutable structure on the query path.
//! [`ShardedIndex`] is an exact (brute-force) implementation: entries are
//! spread across independently locked shards keyed by a hash of the chunk
//! id, so a write only ever holds one shard's lock for the duration of a
//! single map insert or remove.
//!
//! Vectors are L2-normalized on insert, which makes cosine similarity a
//! plain dot product at query time.
//!
//! # Staging
//!
//! An ingestion writes its vectors with [`stage`](VectorIndex::stage).
//! Staged entries take no part in search until
//! [`publish`](VectorIndex::publish) flips them visible, so an unfinished
//! ingestion never competes with indexed documents for result slots.
//!
//! # Ordering
//!
//! Results are sorted by descending score with ties broken by ascending
//! chunk id. Because this is a total order over a fixed candidate set, the
//! top `k1` results of `search(q, k2)` equal `search(q, k1)` for `k1 < k2`.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::error::{QaError, Result};
use crate::models::{EntryMetadata, IndexEntry};

const DEFAULT_SHARDS: usize = 16;

/// A scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    pub metadata: EntryMetadata,
}

/// Nearest-neighbour index keyed by chunk id.
///
/// Implementations must be linearizable per chunk id: a search that starts
/// after `upsert` returns sees the new vector, and a concurrent search sees
/// either the old or the new entry, never a partially written one. After
/// `remove` returns, no search returns the removed id.
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored vector must have.
    fn dims(&self) -> usize;

    /// Insert or replace the entry for `chunk_id`, visible to search.
    fn upsert(&self, chunk_id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()>;

    /// Insert or replace the entry for `chunk_id`, hidden from search.
    fn stage(&self, chunk_id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()>;

    /// Make staged entries visible. Unknown ids are ignored.
    fn publish(&self, chunk_ids: &[String]) -> Result<()>;

    /// Remove one entry. Returns whether it was present.
    fn remove(&self, chunk_id: &str) -> Result<bool>;

    /// Remove every entry whose metadata names `document_id`.
    fn remove_document(&self, document_id: &str) -> Result<usize>;

    /// Return at most `k` visible hits by descending similarity. An empty
    /// index yields an empty result.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    fn get(&self, chunk_id: &str) -> Result<Option<IndexEntry>>;

    /// Number of entries, staged ones included.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Clone)]
struct Slot {
    entry: Arc<IndexEntry>,
    visible: bool,
}

type Shard = RwLock<HashMap<String, Slot>>;

/// Exact vector index with per-shard read/write locks.
pub struct ShardedIndex {
    dims: usize,
    shards: Vec<Shard>,
}

impl ShardedIndex {
    pub fn new(dims: usize) -> Result<Self> {
        Self::with_shards(dims, DEFAULT_SHARDS)
    }

    pub fn with_shards(dims: usize, shards: usize) -> Result<Self> {
        if dims == 0 {
            return Err(QaError::InvalidConfig(
                "index dimensionality must be greater than zero".to_string(),
            ));
        }
        if shards == 0 {
            return Err(QaError::InvalidConfig(
                "index shard count must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dims,
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
        })
    }

    fn shard_for(&self, chunk_id: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        chunk_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn insert(
        &self,
        chunk_id: &str,
        vector: &[f32],
        metadata: EntryMetadata,
        visible: bool,
    ) -> Result<()> {
        self.check_dims(vector)?;
        let entry = Arc::new(IndexEntry {
            chunk_id: chunk_id.to_string(),
            vector: l2_normalize(vector)?,
            metadata,
        });
        // The entry is fully built before the lock is taken; readers see the
        // old slot or the new one.
        let mut shard = self.shard_for(chunk_id).write().map_err(poisoned)?;
        shard.insert(chunk_id.to_string(), Slot { entry, visible });
        Ok(())
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(QaError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> QaError {
    QaError::Storage("vector index lock poisoned".to_string())
}

impl VectorIndex for ShardedIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn upsert(&self, chunk_id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()> {
        self.insert(chunk_id, vector, metadata, true)
    }

    fn stage(&self, chunk_id: &str, vector: &[f32], metadata: EntryMetadata) -> Result<()> {
        self.insert(chunk_id, vector, metadata, false)
    }

    fn publish(&self, chunk_ids: &[String]) -> Result<()> {
        for id in chunk_ids {
            let mut shard = self.shard_for(id).write().map_err(poisoned)?;
            if let Some(slot) = shard.get_mut(id) {
                slot.visible = true;
            }
        }
        Ok(())
    }

    fn remove(&self, chunk_id: &str) -> Result<bool> {
        let mut shard = self.shard_for(chunk_id).write().map_err(poisoned)?;
        Ok(shard.remove(chunk_id).is_some())
    }

    fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut removed = 0;
        for shard in &self.shards {
            let mut guard = shard.write().map_err(poisoned)?;
            let before = guard.len();
            guard.retain(|_, slot| slot.entry.metadata.document_id != document_id);
            removed += before - guard.len();
        }
        Ok(removed)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dims(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = l2_normalize(query)?;

        // Snapshot entry handles one shard at a time, then score without
        // holding any lock.
        let mut entries: Vec<Arc<IndexEntry>> = Vec::new();
        for shard in &self.shards {
            let guard = shard.read().map_err(poisoned)?;
            entries.extend(
                guard
                    .values()
                    .filter(|slot| slot.visible)
                    .map(|slot| slot.entry.clone()),
            );
        }

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|e| SearchHit {
                chunk_id: e.chunk_id.clone(),
                score: dot(&query, &e.vector),
                metadata: e.metadata.clone(),
            })
            .collect();

        if hits.len() > k {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_by(compare_hits);
        Ok(hits)
    }

    fn get(&self, chunk_id: &str) -> Result<Option<IndexEntry>> {
        let shard = self.shard_for(chunk_id).read().map_err(poisoned)?;
        Ok(shard.get(chunk_id).map(|slot| slot.entry.as_ref().clone()))
    }

    fn len(&self) -> Result<usize> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().map_err(poisoned)?.len();
        }
        Ok(total)
    }
}

/// Descending score, then ascending chunk id.
fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit length.
///
/// # Errors
///
/// [`QaError::DegenerateVector`] for zero-length, all-zero, or non-finite
/// vectors.
pub fn l2_normalize(vector: &[f32]) -> Result<Vec<f32>> {
    if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
        return Err(QaError::DegenerateVector);
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return Err(QaError::DegenerateVector);
    }
    Ok(vector.iter().map(|x| x / norm).collect())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

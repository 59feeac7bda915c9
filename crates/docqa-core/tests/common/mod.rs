//! Deterministic capability stubs shared by the integration tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa_core::capability::{AnswerGenerator, Embedder, RetryPolicy};
use docqa_core::index::ShardedIndex;
use docqa_core::models::{Chunk, Document, DocumentStatus, IngestRequest};
use docqa_core::orchestrator::{OrchestratorConfig, QaOrchestrator};
use docqa_core::store::memory::InMemoryStore;
use docqa_core::store::{CommittedChunk, DocumentStore};
use docqa_core::{QaError, Result};
use tokio::sync::Notify;

pub const DIMS: usize = 64;

// ─── Embedder ───────────────────────────────────────────────────────

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
///
/// Can be switched to fail, or to block once until released.
pub struct WordEmbedder {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    block_next: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl WordEmbedder {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            block_next: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Make the next call wait for [`release`](Self::release).
    pub fn block_next_call(&self) {
        self.block_next.store(true, Ordering::SeqCst);
    }
}

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[0] = 0.01;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let bucket = 1 + (hasher.finish() as usize) % (DIMS - 1);
        v[bucket] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "word-stub"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.block_next.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(QaError::Capability {
                capability: "embedder",
                message: "stub embedder switched off".to_string(),
            });
        }
        Ok(word_vector(text))
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Answers by citing the first source marker in the prompt.
///
/// Optionally appends a citation to a document that was never retrieved,
/// sleeps before answering, or fails outright.
pub struct CitingGenerator {
    pub hallucinate: AtomicBool,
    pub fail: AtomicBool,
    pub delay_ms: AtomicUsize,
    pub prompts: std::sync::Mutex<Vec<String>>,
}

impl CitingGenerator {
    pub fn new() -> Self {
        Self {
            hallucinate: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            delay_ms: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }
}

pub const FAKE_MARKER: &str = "[doc:made-up:0-10]";

#[async_trait]
impl AnswerGenerator for CitingGenerator {
    fn name(&self) -> &str {
        "citing-stub"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let delay = self.delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(QaError::Capability {
                capability: "generator",
                message: "stub generator switched off".to_string(),
            });
        }

        let sources = &prompt[prompt.find("## Sources").unwrap()..];
        let start = sources.find("[doc:").unwrap();
        let end = start + sources[start..].find(']').unwrap() + 1;
        let marker = &sources[start..end];

        let mut answer = format!("The sources say so {marker}.");
        if self.hallucinate.load(Ordering::SeqCst) {
            answer.push_str(&format!(" Another source agrees {FAKE_MARKER}."));
        }
        Ok(answer)
    }
}

// ─── Store ──────────────────────────────────────────────────────────

/// Wraps an [`InMemoryStore`]; the next commit of one chosen document
/// waits for [`release`](Self::release) before going through.
pub struct GatedStore {
    pub inner: Arc<InMemoryStore>,
    gate: std::sync::Mutex<Option<String>>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            gate: std::sync::Mutex::new(None),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn hold_next_commit(&self, document_id: &str) {
        *self.gate.lock().unwrap() = Some(document_id.to_string());
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.inner.list_documents().await
    }

    async fn put_document(&self, doc: &Document) -> Result<()> {
        self.inner.put_document(doc).await
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        self.inner.set_status(id, status, last_error).await
    }

    async fn stage_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.inner.stage_chunks(chunks).await
    }

    async fn discard_chunks(&self, chunk_ids: &[String]) -> Result<()> {
        self.inner.discard_chunks(chunk_ids).await
    }

    async fn commit(&self, doc: &Document, active: &[String]) -> Result<Vec<String>> {
        let held = {
            let mut gate = self.gate.lock().unwrap();
            if gate.as_deref() == Some(doc.id.as_str()) {
                gate.take().is_some()
            } else {
                false
            }
        };
        if held {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(doc, active).await
    }

    async fn active_chunk_ids(&self, document_id: &str) -> Result<Vec<String>> {
        self.inner.active_chunk_ids(document_id).await
    }

    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<Chunk>> {
        self.inner.get_chunks(chunk_ids).await
    }

    async fn delete_document(&self, id: &str) -> Result<Option<Vec<String>>> {
        self.inner.delete_document(id).await
    }

    async fn committed_chunks(&self) -> Result<Vec<CommittedChunk>> {
        self.inner.committed_chunks().await
    }

    async fn purge_staged(&self) -> Result<usize> {
        self.inner.purge_staged().await
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub qa: Arc<QaOrchestrator>,
    pub store: Arc<InMemoryStore>,
    pub index: Arc<ShardedIndex>,
    pub embedder: Arc<WordEmbedder>,
    pub generator: Arc<CitingGenerator>,
}

pub fn test_config() -> OrchestratorConfig {
    let once = RetryPolicy::once(Duration::from_secs(5));
    OrchestratorConfig {
        embed_retry: once.clone(),
        generate_retry: once,
        ..OrchestratorConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: OrchestratorConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let index = Arc::new(ShardedIndex::new(DIMS).unwrap());
    let embedder = Arc::new(WordEmbedder::new());
    let generator = Arc::new(CitingGenerator::new());
    let qa = QaOrchestrator::new(
        store.clone(),
        index.clone(),
        embedder.clone(),
        generator.clone(),
        config,
    )
    .unwrap();
    Harness {
        qa: Arc::new(qa),
        store,
        index,
        embedder,
        generator,
    }
}

/// A harness whose orchestrator writes through a [`GatedStore`].
/// `Harness::store` is the store underneath the gate.
pub fn gated_harness(config: OrchestratorConfig) -> (Harness, Arc<GatedStore>) {
    let store = Arc::new(InMemoryStore::new());
    let gated = Arc::new(GatedStore::new(store.clone()));
    let index = Arc::new(ShardedIndex::new(DIMS).unwrap());
    let embedder = Arc::new(WordEmbedder::new());
    let generator = Arc::new(CitingGenerator::new());
    let qa = QaOrchestrator::new(
        gated.clone(),
        index.clone(),
        embedder.clone(),
        generator.clone(),
        config,
    )
    .unwrap();
    let harness = Harness {
        qa: Arc::new(qa),
        store,
        index,
        embedder,
        generator,
    };
    (harness, gated)
}

pub fn text_request(id: &str, title: &str, body: &str) -> IngestRequest {
    IngestRequest {
        document_id: id.to_string(),
        title: title.to_string(),
        bytes: body.as_bytes().to_vec(),
        content_type: "text/plain".to_string(),
    }
}

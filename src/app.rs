//! Wiring: build a ready-to-use [`QaOrchestrator`] from a [`Config`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use docqa_core::index::ShardedIndex;
use docqa_core::orchestrator::QaOrchestrator;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::ExtractingDecoder;
use crate::generation::create_generator;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Open the database, construct the capabilities, and hydrate the
/// in-memory index from committed chunks.
pub async fn open(config: &Config) -> Result<Arc<QaOrchestrator>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let index = ShardedIndex::new(embedder.dims())?;

    let qa = QaOrchestrator::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(index),
        embedder,
        generator,
        config.orchestrator(),
    )?
    .with_decoder(Arc::new(ExtractingDecoder));

    let loaded = qa.hydrate().await.with_context(|| {
        format!(
            "Failed to load stored embeddings into a {}-dimension index; \
             were documents ingested with a different [embedding] config?",
            config.embedding.resolved_dims()
        )
    })?;
    info!(vectors = loaded, "index ready");

    Ok(Arc::new(qa))
}

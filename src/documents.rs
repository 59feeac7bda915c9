//! Document inspection and removal: `docqa list`, `docqa status`,
//! `docqa delete`.

use anyhow::{bail, Result};
use std::sync::Arc;

use docqa_core::models::{DeleteAck, Document, DocumentStatus};
use docqa_core::orchestrator::QaOrchestrator;

use crate::config::Config;

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Print one line per document.
pub async fn run_list(qa: Arc<QaOrchestrator>) -> Result<Vec<Document>> {
    let docs = qa.list_documents().await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(docs);
    }
    for doc in &docs {
        println!(
            "{:<9} {}  {}  ({})",
            doc.status.as_str(),
            doc.id,
            doc.title,
            format_ts_iso(doc.ingested_at)
        );
    }
    Ok(docs)
}

/// Print a single document's status, or a store-wide summary when `id` is
/// `None`.
pub async fn run_status(qa: Arc<QaOrchestrator>, config: &Config, id: Option<&str>) -> Result<()> {
    match id {
        Some(id) => {
            let Some(doc) = qa.document(id).await? else {
                bail!("document not found: {}", id);
            };
            println!("--- Document ---");
            println!("id:           {}", doc.id);
            println!("title:        {}", doc.title);
            println!("status:       {}", doc.status);
            println!("content_type: {}", doc.content_type);
            println!("chars:        {}", doc.content.chars().count());
            println!("ingested_at:  {}", format_ts_iso(doc.ingested_at));
            if let Some(ref err) = doc.last_error {
                println!("last_error:   {}", err);
            }
        }
        None => {
            let docs = qa.list_documents().await?;
            let count = |s: DocumentStatus| docs.iter().filter(|d| d.status == s).count();

            println!("docqa status");
            println!("  database:  {}", config.db.path.display());
            println!("  embedder:  {}", config.embedding.provider);
            println!("  generator: {}", config.generation.provider);
            println!();
            println!("  documents: {}", docs.len());
            println!("    indexed:  {}", count(DocumentStatus::Indexed));
            println!("    indexing: {}", count(DocumentStatus::Indexing));
            println!("    pending:  {}", count(DocumentStatus::Pending));
            println!("    failed:   {}", count(DocumentStatus::Failed));
            println!("  vectors:   {}", qa.indexed_vectors()?);
        }
    }
    Ok(())
}

pub async fn run_delete(qa: Arc<QaOrchestrator>, id: &str) -> Result<DeleteAck> {
    let ack = qa.delete_document(id).await?;
    match ack {
        DeleteAck::Deleted { chunks_removed } => {
            println!("deleted {} ({} chunks removed)", id, chunks_removed);
        }
        DeleteAck::NotFound => println!("not found: {}", id),
    }
    Ok(ack)
}

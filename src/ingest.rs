//! File ingestion for `docqa ingest`.
//!
//! Accepts a single file or a directory. Directories are walked
//! recursively; hidden files and directories are skipped. Each file becomes
//! one document whose id is its path relative to the ingested root (or the
//! file name for a single file), with `/` separators.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use docqa_core::models::{IngestRequest, IngestStatus};
use docqa_core::orchestrator::QaOrchestrator;

use crate::extract::{content_type_for_path, MIME_MARKDOWN};

/// A file scheduled for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItem {
    pub path: PathBuf,
    pub document_id: String,
}

/// Totals reported after an ingestion run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestSummary {
    pub accepted: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub failed: usize,
    pub chunks: usize,
}

/// List the files under `root` with their document ids.
pub fn scan(root: &Path) -> Result<Vec<FileItem>> {
    if root.is_file() {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", root.display()))?;
        return Ok(vec![FileItem {
            path: root.to_path_buf(),
            document_id: document_id_for(Path::new(name)),
        }]);
    }
    if !root.is_dir() {
        bail!("Path does not exist: {}", root.display());
    }

    let mut items = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        items.push(FileItem {
            path: path.to_path_buf(),
            document_id: document_id_for(relative),
        });
    }
    Ok(items)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Relative path with `/` separators; whitespace and brackets become `_`.
pub fn document_id_for(relative: &Path) -> String {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    joined
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '[' || c == ']' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// First Markdown heading, falling back to the file stem.
pub fn title_for(path: &Path, content_type: &str, bytes: &[u8]) -> String {
    if content_type == MIME_MARKDOWN {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if let Some(heading) = text
                .lines()
                .map(str::trim)
                .find_map(|l| l.strip_prefix("# "))
            {
                return heading.trim().to_string();
            }
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ingest every file under `path`.
///
/// `id` and `title` override the derived values and are only allowed for a
/// single file.
pub async fn run_ingest(
    qa: Arc<QaOrchestrator>,
    path: &Path,
    id: Option<String>,
    title: Option<String>,
) -> Result<IngestSummary> {
    let mut items = scan(path)?;
    if (id.is_some() || title.is_some()) && items.len() != 1 {
        bail!("--id and --title can only be used when ingesting a single file");
    }
    if let Some(id) = id {
        items[0].document_id = id;
    }

    println!("ingest {}", path.display());
    let mut summary = IngestSummary::default();
    for item in items {
        let bytes = std::fs::read(&item.path)
            .with_context(|| format!("Failed to read {}", item.path.display()))?;
        let content_type = content_type_for_path(&item.path);
        let title = title
            .clone()
            .unwrap_or_else(|| title_for(&item.path, content_type, &bytes));

        let outcome = qa
            .ingest(IngestRequest {
                document_id: item.document_id.clone(),
                title,
                bytes,
                content_type: content_type.to_string(),
            })
            .await?;

        let label = match outcome.status {
            IngestStatus::Accepted => {
                summary.accepted += 1;
                summary.chunks += outcome.chunks;
                "accepted"
            }
            IngestStatus::Unchanged => {
                summary.unchanged += 1;
                "unchanged"
            }
            IngestStatus::Rejected => {
                summary.rejected += 1;
                "rejected"
            }
            IngestStatus::Failed => {
                summary.failed += 1;
                "failed"
            }
        };
        match outcome.reason {
            Some(reason) => println!("  {:<9} {}: {}", label, outcome.document_id, reason),
            None => println!(
                "  {:<9} {} ({} chunks)",
                label, outcome.document_id, outcome.chunks
            ),
        }
    }

    println!("  accepted: {}", summary.accepted);
    println!("  unchanged: {}", summary.unchanged);
    println!("  rejected: {}", summary.rejected);
    println!("  failed: {}", summary.failed);
    println!("  chunks written: {}", summary.chunks);
    if summary.failed > 0 {
        bail!("{} document(s) failed to ingest", summary.failed);
    }
    println!("ok");
    Ok(summary)
}

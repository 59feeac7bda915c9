//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docqa.sqlite"
//!
//! [chunking]
//! max_chunk_size = 1000
//! overlap_size = 100
//!
//! [retrieval]
//! top_k = 5
//!
//! [context]
//! max_context_size = 6000
//!
//! [embedding]
//! provider = "hash"
//! dims = 256
//!
//! [generation]
//! provider = "extractive"
//!
//! [ask]
//! timeout_ms = 30000
//! ```
//!
//! Every section except `[db]` is optional. API keys are read from the
//! environment (`OPENAI_API_KEY`), never from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docqa_core::capability::RetryPolicy;
use docqa_core::chunk::ChunkConfig;
use docqa_core::orchestrator::OrchestratorConfig;
use docqa_core::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ask: AskConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Chunk sizes, in chars.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
    #[serde(default = "default_boundary_window")]
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap_size: default_overlap_size(),
            boundary_window: default_boundary_window(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_overlap_size() -> usize {
    100
}
fn default_boundary_window() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    #[serde(default = "default_dedup_distance")]
    pub dedup_distance: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            overfetch_factor: default_overfetch_factor(),
            dedup_distance: default_dedup_distance(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_overfetch_factor() -> usize {
    3
}
fn default_dedup_distance() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_context_size")]
    pub max_context_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_size: default_max_context_size(),
        }
    }
}

fn default_max_context_size() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for `openai` (default `https://api.openai.com/v1`) or
    /// `ollama` (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "extractive".to_string()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AskConfig {
    /// Time budget for one question, retrieval and generation included.
    #[serde(default = "default_ask_timeout_ms")]
    pub timeout_ms: u64,
    /// Base delay for capability retries; doubled per attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_ask_timeout_ms(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_ask_timeout_ms() -> u64 {
    30_000
}
fn default_retry_base_ms() -> u64 {
    250
}

impl EmbeddingConfig {
    /// Vector dimensionality, falling back to the provider's default.
    pub fn resolved_dims(&self) -> usize {
        self.dims.unwrap_or(match self.provider.as_str() {
            "hash" => 256,
            "local" => 384,
            _ => 0,
        })
    }
}

impl Config {
    /// Core orchestrator settings derived from this config.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        let base_delay = Duration::from_millis(self.ask.retry_base_ms);
        OrchestratorConfig {
            chunking: ChunkConfig {
                max_chunk_size: self.chunking.max_chunk_size,
                overlap_size: self.chunking.overlap_size,
                boundary_window: self.chunking.boundary_window,
            },
            retrieval: RetrievalParams {
                top_k: self.retrieval.top_k,
                overfetch_factor: self.retrieval.overfetch_factor,
                dedup_distance: self.retrieval.dedup_distance,
            },
            max_context_size: self.context.max_context_size,
            embed_retry: RetryPolicy {
                max_retries: self.embedding.max_retries,
                base_delay,
                attempt_timeout: Duration::from_secs(self.embedding.timeout_secs),
                ..RetryPolicy::default()
            },
            generate_retry: RetryPolicy {
                max_retries: self.generation.max_retries,
                base_delay,
                attempt_timeout: Duration::from_secs(self.generation.timeout_secs),
                ..RetryPolicy::default()
            },
            ask_timeout: Duration::from_millis(self.ask.timeout_ms),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking, retrieval, and context limits
    config
        .orchestrator()
        .validate()
        .context("Invalid [chunking], [retrieval], [context], or [ask] settings")?;

    // Embedding
    match config.embedding.provider.as_str() {
        "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.resolved_dims() == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Generation
    match config.generation.provider.as_str() {
        "extractive" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be extractive, openai, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

//! # docqa CLI
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa ingest <path>` | Ingest a file or every file under a directory |
//! | `docqa ask "<question>"` | Answer a question with citations |
//! | `docqa list` | List documents and their status |
//! | `docqa status [id]` | Show one document, or a summary |
//! | `docqa delete <id>` | Remove a document and its vectors |
//!
//! Logs go to stderr; set `RUST_LOG` (default `info`) to adjust.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docqa::{app, ask, config, documents, ingest, migrate};

/// docqa: ask questions across your documents and get cited answers.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Multi-document question answering with traceable citations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a file, or every non-hidden file under a directory.
    ///
    /// Re-ingesting unchanged content is a no-op; changed content replaces
    /// the previous version atomically.
    Ingest {
        path: PathBuf,

        /// Document id (single file only). Defaults to the file's path
        /// relative to the ingested root.
        #[arg(long)]
        id: Option<String>,

        /// Document title (single file only). Defaults to the first
        /// Markdown heading or the file name.
        #[arg(long)]
        title: Option<String>,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Prior conversation turns to include in the prompt.
        #[arg(long)]
        conversation: Option<String>,

        /// Time budget in milliseconds (overrides `[ask].timeout_ms`).
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List documents.
    List,

    /// Show a document's status, or a summary of the whole store.
    Status { id: Option<String> },

    /// Delete a document, its chunks, and its vectors.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let qa = app::open(&cfg).await?;
    match cli.command {
        Commands::Init => {}
        Commands::Ingest { path, id, title } => {
            ingest::run_ingest(qa, &path, id, title).await?;
        }
        Commands::Ask {
            question,
            conversation,
            timeout_ms,
            json,
        } => {
            ask::run_ask(qa, &question, conversation.as_deref(), timeout_ms, json).await?;
        }
        Commands::List => {
            documents::run_list(qa).await?;
        }
        Commands::Status { id } => {
            documents::run_status(qa, &cfg, id.as_deref()).await?;
        }
        Commands::Delete { id } => {
            documents::run_delete(qa, &id).await?;
        }
    }

    Ok(())
}

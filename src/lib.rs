//! # docqa
//!
//! Multi-document question answering: ingest documents, retrieve the
//! passages relevant to a question, and answer with citations that point
//! back to exact character spans of the source documents.
//!
//! The question-answering core (chunking, vector index, retrieval, context
//! assembly, citation checking, ingestion state machine) lives in
//! [`docqa_core`]. This crate supplies the concrete backends and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │   Files   │──▶│ QaOrchestrator (docqa-core)  │──▶│  SQLite  │
//! │ txt/md/pdf│   │ chunk → embed → index/commit │   │  store   │
//! └───────────┘   └──────────────┬───────────────┘   └──────────┘
//!                                │ ask
//!                                ▼
//!                 retrieve → assemble → generate → check citations
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init
//! docqa ingest ./docs
//! docqa ask "How long do refunds take?"
//! docqa list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Persistent document store |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Answer generation providers |
//! | [`extract`] | PDF/OOXML/text decoding |
//! | [`app`] | Orchestrator wiring |
//! | [`ingest`] | File and directory ingestion |
//! | [`ask`] | Question answering command |
//! | [`documents`] | Listing, status, deletion |

pub mod app;
pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod migrate;
pub mod sqlite_store;

//! # docqa Core
//!
//! Native-free logic for multi-document question answering: data models,
//! chunking, the vector index, retrieval, context assembly, citation
//! validation, and the orchestrator that ties ingestion and answering
//! together.
//!
//! Storage and the two model capabilities (embedding and answer
//! generation) are reached only through traits, so the same code runs
//! against the in-memory store in tests and the SQLite store in the
//! `docqa` application crate.
//!
//! ```text
//! ingest:  bytes ─▶ decode ─▶ chunk ─▶ embed ─▶ index + store ─▶ commit
//! ask:     question ─▶ embed ─▶ search ─▶ collapse ─▶ assemble ─▶ generate ─▶ validate citations
//! ```

pub mod capability;
pub mod chunk;
pub mod citation;
pub mod context;
pub mod decode;
pub mod error;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod retrieve;
pub mod store;

pub use error::{QaError, Result};

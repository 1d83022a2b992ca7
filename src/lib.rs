//! # sop-assist (library root)
//!
//! Retrieval-augmented assistant for pharmaceutical procedure documents.
//! The library covers the whole pipeline behind the `sopa` CLI:
//!
//! - Document loading and text extraction (`loader`)
//! - Normalization and sentence chunking (`chunker`)
//! - Sentence embeddings via Candle (`embedding`)
//! - The persistent HNSW vector index and retrieval (`vector_store`)
//! - Bulk and incremental index updates (`indexer`)
//! - Token-budgeted context assembly (`context`)
//! - Conversation sessions with bounded model history (`session`)
//! - Prompt personas and templates (`prompts`)
//! - Streaming response orchestration (`chat`)
//!
//! The seams are traits: `TextExtractor`, `Embedder`, `Retrieve`, and
//! `GenerationProvider`, so every stage can be exercised without a network
//! or model weights.

use directories::ProjectDirs;
use std::error::Error;

pub mod chat;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod prompts;
pub mod session;
pub mod vector_store;

/// Return the per-platform configuration directory for the assistant.
///
/// Uses [`directories::ProjectDirs`] with the application triple
/// `("dev", "sop-assist", "sopa")`. The directory is not created here;
/// callers that need it should create it with `fs::create_dir_all`.
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("dev", "sop-assist", "sopa")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

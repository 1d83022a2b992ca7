//! Error taxonomy for the ingestion and response pipeline.
//!
//! Each stage of the pipeline owns a small error enum instead of a single
//! catch-all: extraction problems are isolated per file, index build problems
//! are downgraded to an empty index by the caller, and generation problems are
//! rendered into the response stream itself. The binary's top level still
//! works in terms of `Box<dyn Error>`, which all of these convert into.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while turning a file into plain text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file's declared type has no extractor behind the configured
    /// [`TextExtractor`](crate::loader::TextExtractor).
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure inside the embedding provider.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to load embedding model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Failure while creating, loading, or mutating the persistent vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index does not exist at {0}")]
    Missing(PathBuf),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index storage failure at {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    #[error("batch arrays have mismatched lengths: {ids} ids, {texts} texts, {metadatas} metadatas")]
    BatchShape {
        ids: usize,
        texts: usize,
        metadatas: usize,
    },

    #[error("ann index rejected the operation: {0}")]
    Ann(String),

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

/// Failure during similarity retrieval at query time.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("similarity search failed: {0}")]
    Search(String),
}

/// Failure raised by the generation provider, before or during streaming.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Raw error payload from the provider. May contain a quoted
    /// `'message': '...'` fragment that [`user_message`](Self::user_message)
    /// knows how to pull out.
    #[error("{0}")]
    Provider(String),

    /// The request could not even be built or dispatched.
    #[error("generation request failed: {0}")]
    Request(String),
}

static PROVIDER_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'message':\s*'(.*?)'").expect("valid provider message pattern"));

impl GenerationError {
    /// A concise human-readable message suitable for showing to the end user.
    ///
    /// Provider payloads are scanned for a quoted `'message': '...'`
    /// substring; when none is present the raw error text is returned as-is.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Provider(raw) => PROVIDER_MESSAGE
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| raw.clone()),
            GenerationError::Request(msg) => msg.clone(),
        }
    }
}

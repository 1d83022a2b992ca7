//! # Index construction and incremental updates
//!
//! Two entry points mutate the vector index:
//!
//! - [`IndexUpdater::bulk_build`] ingests a whole document batch. Any failure
//!   mid-build falls back to a usable empty (or freshly created) index so the
//!   application always starts, just without retrieval context.
//! - [`IndexUpdater::add_document`] appends one document to an index that
//!   must already exist, reporting success as a plain `bool` so callers on
//!   the interactive path never have to unwind.
//!
//! Bulk chunks get sequential `doc_<n>` IDs with the counter seeded from the
//! current record count, so appending a second batch cannot reuse IDs from
//! the first. Manual uploads get a random 8-hex-char prefix instead.
//!
//! Re-running a bulk build over the same folder inserts the same content
//! again under new IDs. Deduplication is deliberately not attempted here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunker::{SentenceChunker, clean_text};
use crate::embedding::Embedder;
use crate::error::IndexError;
use crate::loader::SourceDocument;
use crate::vector_store::{ChunkMetadata, Provenance, SharedIndex, VectorIndex};

pub struct IndexUpdater {
    chunker: SentenceChunker,
    embedder: Arc<dyn Embedder>,
    index_dir: PathBuf,
}

impl IndexUpdater {
    pub fn new(chunker: SentenceChunker, embedder: Arc<dyn Embedder>, index_dir: &Path) -> Self {
        Self {
            chunker,
            embedder,
            index_dir: index_dir.to_path_buf(),
        }
    }

    /// Build (or extend) the index from a batch of documents.
    ///
    /// Never fails: if anything inside the build goes wrong, including
    /// corrupt files on disk, the error is logged and a fresh empty index
    /// takes its place, persisted so restarts and incremental adds see a
    /// built index.
    pub fn bulk_build(&self, documents: &[SourceDocument]) -> VectorIndex {
        match self.try_bulk_build(documents) {
            Ok(index) => index,
            Err(err) => {
                error!(error = %err, "bulk index build failed, recovering with empty index");
                let mut index = VectorIndex::create(&self.index_dir, Arc::clone(&self.embedder));
                if let Err(save_err) = index.save() {
                    warn!(error = %save_err, "could not persist recovery index");
                }
                index
            }
        }
    }

    fn try_bulk_build(&self, documents: &[SourceDocument]) -> Result<VectorIndex, IndexError> {
        let mut index = VectorIndex::open_or_create(&self.index_dir, Arc::clone(&self.embedder))?;
        let mut counter = index.record_count();

        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();

        for document in documents {
            let cleaned = clean_text(&document.content);
            if cleaned.is_empty() {
                warn!(source = %document.source_id, "document is empty, skipping");
                continue;
            }
            let chunks = self.chunker.chunk(&document.source_id, &cleaned);
            if chunks.is_empty() {
                warn!(source = %document.source_id, "document produced no chunks, skipping");
                continue;
            }
            for chunk in chunks {
                ids.push(format!("doc_{counter}"));
                counter += 1;
                texts.push(chunk.text);
                metadatas.push(ChunkMetadata {
                    source: chunk.source_id,
                    ordinal: chunk.ordinal,
                    total_in_source: chunk.total_in_source,
                    provenance: Provenance::BulkIngest,
                });
            }
        }

        if ids.is_empty() {
            info!("no chunks to index, persisting index unchanged");
            index.save()?;
            return Ok(index);
        }

        index.add(&ids, &texts, &metadatas)?;
        index.save()?;
        info!(chunks = ids.len(), total = index.record_count(), "bulk index build complete");
        Ok(index)
    }

    /// Append one document to an existing shared index.
    ///
    /// Returns `false` without touching the index when the index has never
    /// been built, when the document is empty, or when any step fails; the
    /// cause is logged rather than propagated.
    pub fn add_document(&self, index: &SharedIndex, document: &SourceDocument) -> bool {
        if !VectorIndex::exists(&self.index_dir) {
            error!(
                dir = %self.index_dir.display(),
                "cannot add document: index has not been built yet"
            );
            return false;
        }

        let cleaned = clean_text(&document.content);
        if cleaned.is_empty() {
            error!(source = %document.source_id, "cannot add empty document");
            return false;
        }
        let chunks = self.chunker.chunk(&document.source_id, &cleaned);
        if chunks.is_empty() {
            error!(source = %document.source_id, "document produced no chunks");
            return false;
        }

        let prefix = Uuid::new_v4().simple().to_string();
        let prefix = &prefix[..8];

        let mut ids = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        let mut metadatas = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            ids.push(format!("{prefix}_{i}"));
            texts.push(chunk.text);
            metadatas.push(ChunkMetadata {
                source: chunk.source_id,
                ordinal: chunk.ordinal,
                total_in_source: chunk.total_in_source,
                provenance: Provenance::ManualUpload,
            });
        }

        let mut guard = index.write();
        if let Err(err) = guard.add(&ids, &texts, &metadatas) {
            error!(source = %document.source_id, error = %err, "failed to add document to index");
            return false;
        }
        if let Err(err) = guard.save() {
            error!(source = %document.source_id, error = %err, "failed to persist index after add");
            return false;
        }
        info!(source = %document.source_id, chunks = ids.len(), "document added to index");
        true
    }
}

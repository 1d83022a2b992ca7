//! # Persistent vector index
//!
//! Wraps a [HNSW](https://arxiv.org/abs/1603.09320) approximate
//! nearest-neighbor index (`hora` crate) together with the chunk records it
//! indexes. An index lives in a directory holding two files:
//!
//! - `hnsw_index.bin` — the ANN graph, dumped by `hora`
//! - `records.yaml` — dimension, the next internal slot, and the
//!   slot → record mapping (string ID, chunk text, metadata)
//!
//! Vectors are keyed internally by dense `usize` slots because that is what
//! the ANN index works with; the string IDs callers see (`doc_42`,
//! `9f3ab210_0`) live in the records and never collide with slot numbering.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hora::core::ann_index::{ANNIndex, SerializableIndex};
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{IndexError, RetrieveError};

pub const RECORDS_FILE: &str = "records.yaml";
pub const INDEX_FILE: &str = "hnsw_index.bin";

/// How a chunk entered the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    BulkIngest,
    ManualUpload,
}

/// Metadata stored alongside each indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document identifier (file name).
    pub source: String,
    /// 1-based chunk position within the source.
    pub ordinal: usize,
    /// Total chunks the source produced.
    pub total_in_source: usize,
    pub provenance: Provenance,
}

/// One indexed chunk: its external string ID, text, and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// On-disk shape of `records.yaml`. The ANN graph itself lives in the
/// sibling binary file.
#[derive(Serialize, Deserialize)]
struct PersistedRecords {
    dimension: usize,
    next_slot: usize,
    records: HashMap<usize, IndexRecord>,
}

/// A persistent ANN index over chunk embeddings.
pub struct VectorIndex {
    index: HNSWIndex<f32, usize>,
    dimension: usize,
    next_slot: usize,
    records: HashMap<usize, IndexRecord>,
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Whether a persisted index already exists at `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(RECORDS_FILE).is_file() && dir.join(INDEX_FILE).is_file()
    }

    /// Open the index persisted at `dir`, or create a fresh empty one if
    /// nothing is there yet.
    pub fn open_or_create(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        if Self::exists(dir) {
            return Self::open(dir, embedder);
        }
        Ok(Self::create(dir, embedder))
    }

    /// A fresh empty index rooted at `dir`, ignoring anything on disk there.
    /// Cannot fail; nothing is read or written until [`save`](Self::save).
    pub fn create(dir: &Path, embedder: Arc<dyn Embedder>) -> Self {
        let dimension = embedder.dimension();
        debug!(dir = %dir.display(), dimension, "creating empty vector index");
        Self {
            index: HNSWIndex::new(dimension, &HNSWParams::default()),
            dimension,
            next_slot: 0,
            records: HashMap::new(),
            dir: dir.to_path_buf(),
            embedder,
        }
    }

    fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let records_path = dir.join(RECORDS_FILE);
        let yaml = fs::read_to_string(&records_path).map_err(|e| IndexError::Storage {
            path: records_path.clone(),
            reason: e.to_string(),
        })?;
        let persisted: PersistedRecords =
            serde_yaml::from_str(&yaml).map_err(|e| IndexError::Storage {
                path: records_path,
                reason: e.to_string(),
            })?;

        if persisted.dimension != embedder.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: persisted.dimension,
                actual: embedder.dimension(),
            });
        }

        let index_path = dir.join(INDEX_FILE);
        let index_str = index_path.to_str().ok_or_else(|| IndexError::Storage {
            path: index_path.clone(),
            reason: "non-UTF-8 path".to_string(),
        })?;
        let index =
            HNSWIndex::<f32, usize>::load(index_str).map_err(|e| IndexError::Storage {
                path: index_path,
                reason: e.to_string(),
            })?;

        debug!(dir = %dir.display(), records = persisted.records.len(), "opened vector index");
        Ok(Self {
            index,
            dimension: persisted.dimension,
            next_slot: persisted.next_slot,
            records: persisted.records,
            dir: dir.to_path_buf(),
            embedder,
        })
    }

    /// Embed and insert a batch of chunks, then rebuild the ANN graph so
    /// queries see them. The three slices are parallel arrays and must have
    /// equal length.
    pub fn add(
        &mut self,
        ids: &[String],
        texts: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<(), IndexError> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(IndexError::BatchShape {
                ids: ids.len(),
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if ids.is_empty() {
            return Ok(());
        }

        for ((id, text), metadata) in ids.iter().zip(texts).zip(metadatas) {
            let vector = self.embedder.embed(text)?;
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            let slot = self.next_slot;
            self.index
                .add(&vector, slot)
                .map_err(|e| IndexError::Ann(e.to_string()))?;
            self.records.insert(
                slot,
                IndexRecord {
                    id: id.clone(),
                    text: text.clone(),
                    metadata: metadata.clone(),
                },
            );
            self.next_slot += 1;
        }

        self.index
            .build(Metric::Euclidean)
            .map_err(|e| IndexError::Ann(e.to_string()))?;
        debug!(added = ids.len(), total = self.records.len(), "index batch added");
        Ok(())
    }

    /// Persist the ANN graph and record map to the index directory,
    /// creating the directory as needed.
    pub fn save(&mut self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir).map_err(|e| IndexError::Storage {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;
        let index_path = self.dir.join(INDEX_FILE);
        let index_str = index_path.to_str().ok_or_else(|| IndexError::Storage {
            path: index_path.clone(),
            reason: "non-UTF-8 path".to_string(),
        })?;
        self.index.dump(index_str).map_err(|e| IndexError::Storage {
            path: index_path,
            reason: e.to_string(),
        })?;

        let persisted = PersistedRecords {
            dimension: self.dimension,
            next_slot: self.next_slot,
            records: self.records.clone(),
        };
        let records_path = self.dir.join(RECORDS_FILE);
        let yaml = serde_yaml::to_string(&persisted).map_err(|e| IndexError::Storage {
            path: records_path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&records_path, yaml).map_err(|e| IndexError::Storage {
            path: records_path,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> {
        self.records.values()
    }

    /// Embed `query` and return up to `k` records within `max_distance`,
    /// nearest first. An empty index returns an empty list.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query)?;

        let mut hits = Vec::new();
        for (node, distance) in self.index.search_nodes(&vector, k) {
            if distance > max_distance {
                continue;
            }
            let Some(slot) = node.idx() else { continue };
            if let Some(record) = self.records.get(slot) {
                hits.push(RetrievedChunk {
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                });
            }
        }
        Ok(hits)
    }

    pub fn into_shared(self) -> SharedIndex {
        Arc::new(RwLock::new(self))
    }
}

/// Shared handle to an index used concurrently by retrieval and ingest.
pub type SharedIndex = Arc<RwLock<VectorIndex>>;

/// A chunk returned from similarity search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Retrieval seam consumed by the response pipeline.
pub trait Retrieve: Send + Sync {
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrieveError>;
}

/// Retrieves the `k` nearest chunks within a distance cutoff.
pub struct SimilarityRetriever {
    index: SharedIndex,
    k: usize,
    max_distance: f32,
}

impl SimilarityRetriever {
    pub fn new(index: SharedIndex, k: usize, max_distance: f32) -> Self {
        Self {
            index,
            k,
            max_distance,
        }
    }
}

impl Retrieve for SimilarityRetriever {
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        self.index.read().search(query, self.k, self.max_distance)
    }
}

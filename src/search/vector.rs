use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

const INDEX_FILE: &str = "index.json";
const CHUNKS_FILE: &str = "chunks.json";

/// On-disk form of the vectors; the chunk sequence is stored beside it.
/// Both files carry the same `generation` so a torn pair is detectable.
#[derive(Serialize, Deserialize)]
struct StoredIndex {
    generation: i64,
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct StoredChunks {
    generation: i64,
    chunks: Vec<Chunk>,
}

/// Exact nearest-neighbour index over (vector, chunk) pairs.
///
/// Insertion order is chunk order: `vectors[i]` embeds `chunks[i]`. The index
/// is built in bulk and replaced wholesale; there is no single-item insert.
pub struct VectorIndex {
    dir: PathBuf,
    dim: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
    ready: bool,
}

impl VectorIndex {
    /// Create an empty, not-yet-built index persisting under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dim: 0,
            vectors: Vec::new(),
            chunks: Vec::new(),
            ready: false,
        }
    }

    /// Replace the index with `vectors`/`chunks`. On error the previous
    /// contents are left untouched.
    pub fn build(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<()> {
        let dim = validate(&vectors, &chunks)?;
        self.dim = dim;
        self.vectors = vectors;
        self.chunks = chunks;
        self.ready = true;
        tracing::info!(
            "Built vector index with {} chunks (dim {})",
            self.chunks.len(),
            self.dim
        );
        Ok(())
    }

    /// Return up to `k` chunks by decreasing similarity, where
    /// similarity = 1 / (1 + squared L2 distance).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.is_ready() {
            return Err(RagError::IndexNotReady);
        }
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (1.0 / (1.0 + squared_l2(query, v)), i))
            .collect();

        // Stable: equal similarities keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, i)| ScoredChunk::new(self.chunks[i].clone(), score))
            .collect())
    }

    /// Persist vectors and chunks as a pair.
    ///
    /// Both temp files are written before either is renamed into place, so a
    /// failed write leaves the previous pair untouched.
    pub fn save(&self) -> Result<()> {
        if !self.ready {
            return Err(RagError::IndexNotReady);
        }
        std::fs::create_dir_all(&self.dir)?;

        let generation = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        let index_bytes = serde_json::to_vec(&StoredIndex {
            generation,
            dim: self.dim,
            vectors: self.vectors.clone(),
        })?;
        let chunks_bytes = serde_json::to_vec(&StoredChunks {
            generation,
            chunks: self.chunks.clone(),
        })?;

        let index_path = self.dir.join(INDEX_FILE);
        let chunks_path = self.dir.join(CHUNKS_FILE);
        let index_tmp = tmp_path(&index_path);
        let chunks_tmp = tmp_path(&chunks_path);

        std::fs::write(&index_tmp, &index_bytes)?;
        if let Err(e) = std::fs::write(&chunks_tmp, &chunks_bytes) {
            let _ = std::fs::remove_file(&index_tmp);
            return Err(e.into());
        }
        std::fs::rename(&chunks_tmp, &chunks_path)?;
        std::fs::rename(&index_tmp, &index_path)?;

        tracing::info!("Vector index saved to {}", self.dir.display());
        Ok(())
    }

    /// Restore from disk. Returns `false` if either file is absent; a pair
    /// from different saves is [`RagError::CorruptIndex`].
    pub fn load(&mut self) -> Result<bool> {
        let index_path = self.dir.join(INDEX_FILE);
        let chunks_path = self.dir.join(CHUNKS_FILE);
        if !index_path.exists() || !chunks_path.exists() {
            return Ok(false);
        }

        let stored: StoredIndex = serde_json::from_slice(&std::fs::read(&index_path)?)?;
        let stored_chunks: StoredChunks = serde_json::from_slice(&std::fs::read(&chunks_path)?)?;
        if stored.generation != stored_chunks.generation {
            return Err(RagError::CorruptIndex(format!(
                "{INDEX_FILE} (generation {}) and {CHUNKS_FILE} (generation {}) are from different saves",
                stored.generation, stored_chunks.generation
            )));
        }
        let chunks = stored_chunks.chunks;

        let dim = validate(&stored.vectors, &chunks)?;
        if !stored.vectors.is_empty() && dim != stored.dim {
            return Err(RagError::DimensionMismatch {
                expected: stored.dim,
                actual: dim,
            });
        }

        self.dim = stored.dim;
        self.vectors = stored.vectors;
        self.chunks = chunks;
        self.ready = true;

        tracing::info!("Loaded vector index with {} chunks", self.chunks.len());
        Ok(true)
    }

    /// Drop in-memory and on-disk state. Safe to call repeatedly.
    pub fn clear(&mut self) -> Result<()> {
        self.dim = 0;
        self.vectors.clear();
        self.chunks.clear();
        self.ready = false;

        for name in [INDEX_FILE, CHUNKS_FILE] {
            match std::fs::remove_file(self.dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("Vector index cleared");
        Ok(())
    }

    /// Built (or loaded) and non-empty.
    pub fn is_ready(&self) -> bool {
        self.ready && !self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Check the pairing and width invariants; returns the common dimension.
fn validate(vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<usize> {
    if vectors.len() != chunks.len() {
        return Err(RagError::DimensionMismatch {
            expected: chunks.len(),
            actual: vectors.len(),
        });
    }
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    for v in vectors {
        if v.len() != dim {
            return Err(RagError::DimensionMismatch {
                expected: dim,
                actual: v.len(),
            });
        }
    }
    Ok(dim)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk::new(
            content.to_string(),
            ChunkMetadata {
                filename: "doc.txt".to_string(),
                page: 1,
                chunk_id: id.to_string(),
                source: "/tmp/doc.txt".to_string(),
            },
        )
        .unwrap()
    }

    fn sample() -> (Vec<Vec<f32>>, Vec<Chunk>) {
        (
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]],
            vec![
                chunk("1_0", "east"),
                chunk("1_1", "north"),
                chunk("1_2", "west"),
            ],
        )
    }

    #[test]
    fn test_search_before_build_is_not_ready() {
        let index = VectorIndex::new("/nonexistent");
        let err = index.search(&[1.0, 0.0], 3).unwrap_err();
        assert!(matches!(err, RagError::IndexNotReady));
    }

    #[test]
    fn test_build_rejects_count_mismatch() {
        let mut index = VectorIndex::new("/nonexistent");
        let (vectors, mut chunks) = sample();
        chunks.pop();
        let err = index.build(vectors, chunks).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
        assert!(!index.is_ready());
    }

    #[test]
    fn test_build_rejects_ragged_vectors() {
        let mut index = VectorIndex::new("/nonexistent");
        let (mut vectors, chunks) = sample();
        vectors[1] = vec![0.0, 1.0, 0.0];
        assert!(matches!(
            index.build(vectors, chunks),
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_failed_build_keeps_previous_index() {
        let mut index = VectorIndex::new("/nonexistent");
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();
        assert!(index.build(vec![vec![1.0]], vec![]).is_err());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut index = VectorIndex::new("/nonexistent");
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.content, "east");
        assert_eq!(results[1].chunk.content, "north");
        assert_eq!(results[2].chunk.content, "west");
        // 1 / (1 + d^2)
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 1.0 / 3.0).abs() < 1e-6);
        assert!((results[2].score - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_search_k_larger_than_corpus() {
        let mut index = VectorIndex::new("/nonexistent");
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();
        assert_eq!(index.search(&[0.0, 1.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let mut index = VectorIndex::new("/nonexistent");
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 3),
            Err(RagError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_clear_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(dir.path());
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();
        index.save().unwrap();
        let before = index.search(&[0.6, 0.8], 3).unwrap();

        index.clear().unwrap();
        assert!(!index.is_ready());
        assert!(!index.load().unwrap());

        // Save again, then load into a fresh instance
        let (vectors, chunks) = sample();
        index.build(vectors, chunks).unwrap();
        index.save().unwrap();
        let mut restored = VectorIndex::new(dir.path());
        assert!(restored.load().unwrap());
        assert_eq!(restored.len(), 3);

        let after = restored.search(&[0.6, 0.8], 3).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.chunk, b.chunk);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_without_files_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(dir.path());
        assert!(!index.load().unwrap());
    }

    #[test]
    fn test_load_with_only_one_file_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CHUNKS_FILE), "[]").unwrap();
        let mut index = VectorIndex::new(dir.path());
        assert!(!index.load().unwrap());
    }

    fn saved(dir: &Path, contents: [&str; 2]) -> VectorIndex {
        let mut index = VectorIndex::new(dir);
        index
            .build(
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![chunk("1_0", contents[0]), chunk("1_1", contents[1])],
            )
            .unwrap();
        index.save().unwrap();
        index
    }

    #[test]
    fn test_failed_chunk_write_keeps_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        saved(dir.path(), ["old alpha", "old beta"]);

        // A directory where the chunk temp file should go makes that write fail
        std::fs::create_dir(dir.path().join("chunks.json.tmp")).unwrap();
        let mut next = VectorIndex::new(dir.path());
        next.build(
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            vec![chunk("1_0", "new gamma"), chunk("1_1", "new delta")],
        )
        .unwrap();
        assert!(next.save().is_err());
        assert!(!dir.path().join("index.json.tmp").exists());

        let mut restored = VectorIndex::new(dir.path());
        assert!(restored.load().unwrap());
        let hit = restored.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hit[0].chunk.content, "old beta");
    }

    #[test]
    fn test_load_rejects_pair_from_different_saves() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        saved(first.path(), ["old alpha", "old beta"]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        saved(second.path(), ["new gamma", "new delta"]);

        std::fs::copy(
            second.path().join(INDEX_FILE),
            first.path().join(INDEX_FILE),
        )
        .unwrap();

        let mut index = VectorIndex::new(first.path());
        assert!(matches!(index.load(), Err(RagError::CorruptIndex(_))));
        assert!(!index.is_ready());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(dir.path());
        index.clear().unwrap();
        index.clear().unwrap();
    }
}

use std::collections::HashMap;

use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};
use crate::search::bm25::{tokenize, Bm25Index};
use crate::search::vector::VectorIndex;

/// Min-max normalise to [0, 1]. A list whose values are all equal maps every
/// entry to 1.0.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == min {
        return vec![1.0; scores.len()];
    }
    let range = max - min;
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Weighted union of dense and lexical result lists.
///
/// Each list is normalised independently, then
/// `fused = (1 - alpha) * dense + alpha * lexical`. A chunk found by only one
/// path keeps only that path's weighted term; absence from the other list is
/// not penalised. Output is sorted by fused score (stable, dense-first
/// insertion order on ties).
pub fn fuse(dense: Vec<ScoredChunk>, lexical: Vec<ScoredChunk>, alpha: f32) -> Vec<ScoredChunk> {
    let dense_norm = normalize_scores(&dense.iter().map(|r| r.score).collect::<Vec<_>>());
    let lexical_norm = normalize_scores(&lexical.iter().map(|r| r.score).collect::<Vec<_>>());

    let mut fused: Vec<ScoredChunk> = Vec::with_capacity(dense.len() + lexical.len());
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for (hit, norm) in dense.into_iter().zip(dense_norm) {
        let key = owned_key(&hit.chunk);
        let weighted = (1.0 - alpha) * norm;
        match positions.get(&key) {
            Some(&pos) => fused[pos].score += weighted,
            None => {
                positions.insert(key, fused.len());
                fused.push(ScoredChunk::new(hit.chunk, weighted));
            }
        }
    }

    for (hit, norm) in lexical.into_iter().zip(lexical_norm) {
        let key = owned_key(&hit.chunk);
        let weighted = alpha * norm;
        match positions.get(&key) {
            Some(&pos) => fused[pos].score += weighted,
            None => {
                positions.insert(key, fused.len());
                fused.push(ScoredChunk::new(hit.chunk, weighted));
            }
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused
}

fn owned_key(chunk: &Chunk) -> (String, String) {
    let (source, id) = chunk.key();
    (source.to_string(), id.to_string())
}

/// Dense + lexical retrieval over one chunk corpus.
///
/// The vector index owns the chunk sequence; the BM25 index is derived from
/// it and rebuilt every time the corpus changes, so the two never disagree
/// about corpus size.
pub struct HybridRetriever {
    vectors: VectorIndex,
    lexical: Option<Bm25Index>,
}

impl HybridRetriever {
    pub fn new(vectors: VectorIndex) -> Self {
        let lexical = Bm25Index::build(vectors.chunks());
        Self { vectors, lexical }
    }

    /// Swap in a freshly built vector index and rebuild BM25 over its chunks.
    pub fn replace(&mut self, vectors: VectorIndex) {
        self.lexical = Bm25Index::build(vectors.chunks());
        self.vectors = vectors;
    }

    /// Load the persisted vector index and derive BM25 from it.
    pub fn load(&mut self) -> Result<bool> {
        let loaded = self.vectors.load()?;
        self.lexical = Bm25Index::build(self.vectors.chunks());
        Ok(loaded)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.vectors.clear()?;
        self.lexical = None;
        Ok(())
    }

    /// Fused top-`k` for an already-embedded query.
    ///
    /// `query_vector` must come from the query-side embedding of `query`;
    /// `alpha` is the lexical weight.
    pub fn search(
        &self,
        query_vector: &[f32],
        query: &str,
        k: usize,
        alpha: f32,
    ) -> Result<Vec<ScoredChunk>> {
        if !self.vectors.is_ready() {
            return Err(RagError::IndexNotReady);
        }

        let dense = self.vectors.search(query_vector, k)?;

        let Some(lexical_index) = &self.lexical else {
            tracing::debug!("No lexical index; dense-only retrieval");
            let mut results = dense;
            results.truncate(k);
            return Ok(results);
        };

        let chunks = self.vectors.chunks();
        let lexical: Vec<ScoredChunk> = lexical_index
            .top_k(&tokenize(query), k)
            .into_iter()
            .map(|(i, score)| ScoredChunk::new(chunks[i].clone(), score))
            .collect();

        tracing::debug!(
            "Hybrid retrieval: {} dense, {} lexical candidates",
            dense.len(),
            lexical.len()
        );

        let mut fused = fuse(dense, lexical, alpha);
        fused.truncate(k);
        Ok(fused)
    }

    pub fn is_ready(&self) -> bool {
        self.vectors.is_ready()
    }

    pub fn chunk_count(&self) -> usize {
        self.vectors.len()
    }

    /// Number of distinct source documents in the corpus.
    pub fn document_count(&self) -> usize {
        let mut sources: Vec<&str> = self
            .vectors
            .chunks()
            .iter()
            .map(|c| c.metadata.source.as_str())
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources.len()
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }
}

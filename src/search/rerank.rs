//! Second-pass ordering of retrieval candidates by a cross-encoder.

use anyhow::Result;

use crate::llm::cross_encoder::CrossEncoder;
use crate::models::ScoredChunk;

/// Re-score `results` with `encoder` and keep the best `k`.
///
/// The incoming fused scores are discarded, not blended: each result carries
/// the cross-encoder's raw score afterwards. Equal scores keep their
/// retrieval order.
pub async fn rerank<C: CrossEncoder>(
    encoder: &C,
    query: &str,
    results: Vec<ScoredChunk>,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    if results.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let documents: Vec<String> = results.iter().map(|r| r.chunk.content.clone()).collect();
    let scores = encoder.score(query, &documents).await?;
    if scores.len() != results.len() {
        anyhow::bail!(
            "Cross-encoder returned {} scores for {} documents",
            scores.len(),
            results.len()
        );
    }

    let mut reranked: Vec<ScoredChunk> = results
        .into_iter()
        .zip(scores)
        .map(|(r, score)| ScoredChunk::new(r.chunk, score))
        .collect();

    reranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    reranked.truncate(k);
    Ok(reranked)
}

use std::collections::HashMap;

use crate::models::Chunk;

/// Term-frequency saturation.
const K1: f32 = 1.5;
/// Document-length normalisation.
const B: f32 = 0.75;
/// Floor for negative IDFs, as a fraction of the mean IDF.
const EPSILON: f32 = 0.25;

/// Lowercase whitespace tokenisation. Queries and documents must go through
/// the same function for their scores to be comparable.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// In-memory BM25 (Okapi) index over a chunk sequence.
///
/// Derived data only: it is rebuilt from the chunk sequence whenever that
/// changes and is never persisted.
#[derive(Debug)]
pub struct Bm25Index {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f32,
    idf: HashMap<String, f32>,
}

impl Bm25Index {
    /// Build over `chunks`. Returns `None` for an empty corpus.
    pub fn build(chunks: &[Chunk]) -> Option<Self> {
        if chunks.is_empty() {
            return None;
        }

        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lengths = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for chunk in chunks {
            let tokens = tokenize(&chunk.content);
            doc_lengths.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let n = chunks.len() as f32;
        let avg_doc_len = doc_lengths.iter().sum::<usize>() as f32 / n;

        let mut idf = HashMap::with_capacity(doc_freqs.len());
        let mut idf_sum = 0.0f32;
        let mut negative = Vec::new();
        for (term, df) in doc_freqs {
            let df = df as f32;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        // Terms in more than half the corpus get a small positive floor
        let floor = if idf.is_empty() {
            0.0
        } else {
            EPSILON * idf_sum / idf.len() as f32
        };
        for term in negative {
            idf.insert(term, floor);
        }

        tracing::debug!("BM25 index built over {} chunks", chunks.len());

        Some(Self {
            term_freqs,
            doc_lengths,
            avg_doc_len,
            idf,
        })
    }

    /// Score every chunk in corpus order. Repeated query tokens count once per
    /// occurrence.
    pub fn score_all(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.term_freqs.len()];

        for token in query_tokens {
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };
            for (i, freqs) in self.term_freqs.iter().enumerate() {
                let tf = freqs.get(token).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let len_norm = if self.avg_doc_len > 0.0 {
                    self.doc_lengths[i] as f32 / self.avg_doc_len
                } else {
                    0.0
                };
                scores[i] += idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * len_norm));
            }
        }

        scores
    }

    /// Highest-scoring `(corpus position, score)` pairs; ties keep corpus order.
    pub fn top_k(&self, query_tokens: &[String], k: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> =
            self.score_all(query_tokens).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }

    pub fn len(&self) -> usize {
        self.term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_freqs.is_empty()
    }
}

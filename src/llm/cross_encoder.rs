//! Cross-encoder scoring via an OpenAI-compatible `/v1/rerank` endpoint.
//!
//! Sends one batch request with every query-document pair instead of one call
//! per document.

use std::future::Future;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;

/// Pairwise relevance scorer. Higher is better; the range depends on the model.
pub trait CrossEncoder: Send + Sync {
    /// Score `(query, documents[i])` for every `i`, in input order.
    fn score(
        &self,
        query: &str,
        documents: &[String],
    ) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// Cross-encoder served over HTTP (llama-server, TEI, or anything speaking
/// the `/v1/rerank` shape).
#[derive(Clone)]
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    config: RerankerConfig,
}

impl HttpCrossEncoder {
    pub fn new(client: reqwest::Client, config: RerankerConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.base_url.is_some()
    }
}

impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .context("Reranker base_url not configured")?;

        let model = self.config.model.as_deref().unwrap_or("default");
        let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

        let req_body = RerankRequest {
            model: model.to_string(),
            query: query.to_string(),
            documents: documents.to_vec(),
            top_n: documents.len(),
        };

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs.min(30));

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&req_body)
            .send()
            .await
            .context("Failed to reach reranker endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reranker returned {status}: {body}");
        }

        let body: RerankResponse = resp
            .json()
            .await
            .context("Failed to parse reranker response")?;

        Ok(scores_by_index(body.results, documents.len()))
    }
}

/// Place each returned score at its document's input position. Documents the
/// endpoint left out sort last.
fn scores_by_index(results: Vec<RerankResultRaw>, len: usize) -> Vec<f32> {
    let mut scores = vec![f32::NEG_INFINITY; len];
    for r in results {
        if let Some(slot) = scores.get_mut(r.index) {
            *slot = r.relevance_score;
        } else {
            tracing::warn!("Reranker returned out-of-range index {}", r.index);
        }
    }
    scores
}

// ─── Request/Response types ────────────────────────────

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}

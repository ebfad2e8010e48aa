//! End-to-end orchestration: ingestion, retrieval, reranking and answering.
//!
//! Requests are expected one at a time (the HTTP layer serialises them). Each
//! request snapshots [`RetrievalConfig`] once and uses that snapshot for every
//! stage, so a settings change mid-request only affects later requests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use crate::chunking::chunk_pages;
use crate::config::{ChunkingConfig, RetrievalConfig, RetrievalConfigUpdate};
use crate::error::RagError;
use crate::extract::{collect_input_files, TextExtractor};
use crate::llm::cross_encoder::CrossEncoder;
use crate::llm::embeddings::Embedder;
use crate::llm::generate::Generator;
use crate::llm::prompt::build_messages;
use crate::memory::ConversationMemory;
use crate::models::{
    Answer, Chunk, IngestFailure, IngestReport, MemoryTurn, ScoredChunk, StatsResponse,
};
use crate::search::hybrid::HybridRetriever;
use crate::search::rerank::rerank;
use crate::search::vector::VectorIndex;

pub struct RagPipeline<E, C, G> {
    embedder: E,
    /// `None` keeps results in fused order.
    cross_encoder: Option<C>,
    generator: G,
    extractor: Arc<dyn TextExtractor>,
    chunking: ChunkingConfig,
    retriever: RwLock<HybridRetriever>,
    memory: RwLock<ConversationMemory>,
    settings: RwLock<RetrievalConfig>,
}

impl<E, C, G> RagPipeline<E, C, G>
where
    E: Embedder,
    C: CrossEncoder,
    G: Generator,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: E,
        cross_encoder: Option<C>,
        generator: G,
        extractor: Arc<dyn TextExtractor>,
        chunking: ChunkingConfig,
        settings: RetrievalConfig,
        vector_dir: PathBuf,
    ) -> Self {
        Self {
            embedder,
            cross_encoder,
            generator,
            extractor,
            chunking,
            retriever: RwLock::new(HybridRetriever::new(VectorIndex::new(vector_dir))),
            memory: RwLock::new(ConversationMemory::new()),
            settings: RwLock::new(settings),
        }
    }

    /// Restore a persisted index. `false` means there was none.
    pub fn load(&self) -> Result<bool> {
        let mut retriever = self.retriever.write();
        let loaded = retriever.load().context("Failed to load persisted index")?;
        if loaded {
            tracing::info!(
                "Loaded {} chunks from {} documents",
                retriever.chunk_count(),
                retriever.document_count()
            );
        }
        Ok(loaded)
    }

    // ─── Settings ────────────────────────────────────────

    /// Snapshot of the current settings.
    pub fn settings(&self) -> RetrievalConfig {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, update: RetrievalConfigUpdate) -> Result<RetrievalConfig> {
        let mut settings = self.settings.write();
        settings.apply(update)?;
        tracing::info!("Retrieval settings updated: {:?}", *settings);
        Ok(settings.clone())
    }

    // ─── Ingestion ───────────────────────────────────────

    /// Extract, chunk, embed and index `inputs`, replacing the current corpus.
    ///
    /// Per-file failures are reported and skipped. The live index is swapped
    /// only after the new one is fully built and saved; a batch that yields
    /// no chunks leaves it untouched.
    pub async fn ingest(&self, inputs: Vec<PathBuf>) -> Result<IngestReport> {
        let extractor = Arc::clone(&self.extractor);
        let chunking = self.chunking.clone();
        let (chunks, files_indexed, failures) =
            tokio::task::spawn_blocking(move || extract_and_chunk(&inputs, &*extractor, &chunking))
                .await
                .context("Extraction task failed")?;

        let mut report = IngestReport {
            files_indexed,
            failures,
            chunk_count: chunks.len(),
        };

        if chunks.is_empty() {
            tracing::warn!("Ingestion produced no chunks; keeping the existing index");
            return Ok(report);
        }

        tracing::info!(
            "Embedding {} chunks from {} files",
            chunks.len(),
            report.files_indexed
        );
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .context("Failed to embed document chunks")?;

        let vector_dir = self.retriever.read().vectors().dir().to_path_buf();
        let mut fresh = VectorIndex::new(vector_dir);
        fresh.build(vectors, chunks)?;
        fresh.save()?;

        self.retriever.write().replace(fresh);
        report.chunk_count = self.retriever.read().chunk_count();

        tracing::info!(
            "Indexed {} chunks from {} files ({} failed)",
            report.chunk_count,
            report.files_indexed,
            report.failures.len()
        );
        Ok(report)
    }

    pub fn clear_index(&self) -> Result<()> {
        self.retriever.write().clear()?;
        Ok(())
    }

    // ─── Retrieval ───────────────────────────────────────

    /// Hybrid retrieval: at most `k` chunks by fused score.
    pub async fn retrieve(&self, query: &str, k: usize, alpha: f32) -> Result<Vec<ScoredChunk>> {
        if !self.retriever.read().is_ready() {
            return Err(RagError::IndexNotReady.into());
        }

        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed query")?;

        let results = self
            .retriever
            .read()
            .search(&query_vector, query, k, alpha)?;
        Ok(results)
    }

    /// Cross-encoder rerank, or the fused order truncated to `k` when no
    /// reranker is configured or the call fails.
    pub async fn rerank_or_fallback(
        &self,
        query: &str,
        mut results: Vec<ScoredChunk>,
        k: usize,
    ) -> Vec<ScoredChunk> {
        let Some(encoder) = &self.cross_encoder else {
            results.truncate(k);
            return results;
        };

        let fallback: Vec<ScoredChunk> = results.iter().take(k).cloned().collect();
        match rerank(encoder, query, results, k).await {
            Ok(reranked) => {
                tracing::debug!("Re-ranking applied to {} results", reranked.len());
                reranked
            }
            Err(e) => {
                tracing::warn!("Re-ranking failed, keeping fused order: {e:#}");
                fallback
            }
        }
    }

    /// Retrieval and reranking without generation.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        use_rerank: bool,
    ) -> Result<Vec<ScoredChunk>> {
        let settings = self.settings();
        let limit = limit.unwrap_or(settings.top_k_rerank).max(1);
        let breadth = settings.top_k_retrieval.max(limit);

        let retrieved = self.retrieve(query, breadth, settings.bm25_weight).await?;
        if use_rerank {
            Ok(self.rerank_or_fallback(query, retrieved, limit).await)
        } else {
            let mut results = retrieved;
            results.truncate(limit);
            Ok(results)
        }
    }

    // ─── Answering ───────────────────────────────────────

    /// Full pipeline for one question.
    ///
    /// Retrieval failures (e.g. no index) are errors. Generation failures are
    /// not: they come back inside [`Answer::outcome`] with the sources intact.
    /// Every exchange is added to memory; failed ones are kept out of later
    /// prompts.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let settings = self.settings();

        let retrieved = self
            .retrieve(question, settings.top_k_retrieval, settings.bm25_weight)
            .await?;
        let sources = self
            .rerank_or_fallback(question, retrieved, settings.top_k_rerank)
            .await;

        let history = self
            .memory
            .read()
            .window(settings.memory_window, settings.max_memory_tokens);
        tracing::debug!(
            "Prompt: {} documents, {} history turns",
            sources.len(),
            history.len()
        );

        let messages = build_messages(question, &sources, &history);
        let outcome = self
            .generator
            .generate(&messages, settings.temperature, settings.max_tokens)
            .await;

        let answer = Answer { outcome, sources };
        if let Err(e) = &answer.outcome {
            tracing::warn!("Generation failed: {e}");
        }
        self.memory.write().push(answer.to_turn(question));

        Ok(answer)
    }

    // ─── Memory & stats ──────────────────────────────────

    pub fn history(&self) -> Vec<MemoryTurn> {
        self.memory.read().turns().to_vec()
    }

    pub fn clear_memory(&self) {
        self.memory.write().clear();
        tracing::info!("Conversation memory cleared");
    }

    pub fn stats(&self) -> StatsResponse {
        let retriever = self.retriever.read();
        StatsResponse {
            documents: retriever.document_count(),
            chunks: retriever.chunk_count(),
            conversations: self.memory.read().len(),
            index_ready: retriever.is_ready(),
        }
    }
}

/// Extract and chunk every input file, isolating per-file failures.
fn extract_and_chunk(
    inputs: &[PathBuf],
    extractor: &dyn TextExtractor,
    chunking: &ChunkingConfig,
) -> (Vec<Chunk>, usize, Vec<IngestFailure>) {
    let mut chunks = Vec::new();
    let mut failures = Vec::new();
    let mut files_indexed = 0usize;
    let mut seen = HashSet::new();

    for path in collect_input_files(inputs, extractor) {
        if !seen.insert(path.clone()) {
            tracing::debug!("Skipping duplicate input {}", path.display());
            continue;
        }

        let result = extractor
            .extract(&path)
            .and_then(|pages| chunk_pages(&path, &pages, chunking));

        match result {
            Ok(file_chunks) if file_chunks.is_empty() => {
                tracing::warn!("Skipping {}: no extractable text", path.display());
                failures.push(IngestFailure {
                    path: path.display().to_string(),
                    reason: "no extractable text".to_string(),
                });
            }
            Ok(file_chunks) => {
                tracing::info!("{}: {} chunks", path.display(), file_chunks.len());
                files_indexed += 1;
                chunks.extend(file_chunks);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                failures.push(IngestFailure {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (chunks, files_indexed, failures)
}

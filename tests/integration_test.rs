//! Integration tests for the doc-qa pipeline.
//!
//! These tests exercise the full ingestion and answering flow with in-process
//! stand-ins for the embedding, reranking and chat-completion services.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use doc_qa::config::{ChunkingConfig, RetrievalConfig, RetrievalConfigUpdate};
use doc_qa::error::RagError;
use doc_qa::extract::PlainTextExtractor;
use doc_qa::llm::cross_encoder::CrossEncoder;
use doc_qa::llm::embeddings::{l2_normalize, Embedder};
use doc_qa::llm::generate::{GenerationError, Generator};
use doc_qa::models::{ChatMessage, Chunk, ChunkMetadata};
use doc_qa::pipeline::RagPipeline;
use doc_qa::search::hybrid::HybridRetriever;
use doc_qa::search::vector::VectorIndex;

/// One axis per topic word; a text's vector counts its topic words.
const TOPICS: [&str; 6] = ["battery", "solar", "inverter", "pump", "valve", "pressure"];

struct TopicEmbedder;

fn topic_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = TOPICS
        .iter()
        .map(|t| lower.matches(t).count() as f32)
        .collect();
    // Keeps off-topic text away from the origin
    v.push(0.1);
    l2_normalize(v)
}

impl Embedder for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| topic_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(topic_vector(text))
    }
}

/// Scores documents by how many times they mention `keyword`.
struct KeywordEncoder {
    keyword: &'static str,
}

impl CrossEncoder for KeywordEncoder {
    async fn score(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<f32>> {
        Ok(documents
            .iter()
            .map(|d| d.to_lowercase().matches(self.keyword).count() as f32)
            .collect())
    }
}

struct CannedGenerator;

impl Generator for CannedGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if last.contains("[Document 1]") {
            Ok("See [Document 1].".to_string())
        } else {
            Ok("I cannot find this information in the provided documents".to_string())
        }
    }
}

struct UpstreamDown;

impl Generator for UpstreamDown {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::UpstreamStatus {
            status: 503,
            body: "overloaded".to_string(),
        })
    }
}

/// Helper: a small off-grid homestead manual split across three files.
fn write_manual(root: &Path) -> PathBuf {
    let docs = root.join("manual");
    std::fs::create_dir_all(docs.join("water")).unwrap();
    std::fs::write(
        docs.join("power.txt"),
        "The solar array charges the battery bank. The inverter converts battery \
         power to household current. Check inverter fault lights monthly.",
    )
    .unwrap();
    std::fs::write(
        docs.join("water").join("pump.md"),
        "The well pump turns on when pressure drops below 40 psi. \
         If the pump cycles rapidly, the pressure tank bladder has failed.",
    )
    .unwrap();
    std::fs::write(
        docs.join("water").join("valves.txt"),
        "Close the main valve before servicing the pressure tank. \
         The check valve stops water draining back down the well.",
    )
    .unwrap();
    std::fs::write(docs.join("wiring.pdf"), "%PDF-1.7 binary").unwrap();
    docs
}

fn pipeline<C, G>(
    root: &Path,
    encoder: Option<C>,
    generator: G,
) -> RagPipeline<TopicEmbedder, C, G>
where
    C: CrossEncoder,
    G: Generator,
{
    RagPipeline::new(
        TopicEmbedder,
        encoder,
        generator,
        Arc::new(PlainTextExtractor::default()),
        ChunkingConfig::default(),
        RetrievalConfig::default(),
        root.join("vector_store"),
    )
}

fn chunk(source: &str, id: &str, content: &str) -> Chunk {
    Chunk::new(
        content.to_string(),
        ChunkMetadata {
            filename: source.to_string(),
            page: 1,
            chunk_id: id.to_string(),
            source: source.to_string(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_ingest_and_ask() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_manual(dir.path());
    let rag = pipeline(dir.path(), Some(KeywordEncoder { keyword: "pump" }), CannedGenerator);

    // Directory walk skips the pdf; naming it explicitly surfaces a failure
    let report = rag
        .ingest(vec![docs.clone(), docs.join("wiring.pdf")])
        .await
        .unwrap();
    assert_eq!(report.files_indexed, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].reason.contains("unsupported"));

    let answer = rag.ask("why does the pump cycle so often").await.unwrap();
    assert_eq!(answer.outcome.as_deref().unwrap(), "See [Document 1].");
    assert_eq!(answer.sources[0].chunk.metadata.filename, "pump.md");
    assert!(answer.sources.len() <= RetrievalConfig::default().top_k_rerank);

    let history = rag.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sources[0].filename, "pump.md");
    assert_eq!(rag.stats().conversations, 1);

    rag.clear_memory();
    assert!(rag.history().is_empty());
}

#[tokio::test]
async fn test_generation_failure_still_returns_sources() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_manual(dir.path());
    let rag = pipeline::<KeywordEncoder, _>(dir.path(), None, UpstreamDown);
    rag.ingest(vec![docs]).await.unwrap();

    let answer = rag.ask("inverter fault lights").await.unwrap();
    match &answer.outcome {
        Err(GenerationError::UpstreamStatus { status, .. }) => assert_eq!(*status, 503),
        other => panic!("expected upstream failure, got {other:?}"),
    }
    assert_eq!(answer.sources[0].chunk.metadata.filename, "power.txt");
    assert!(answer.display_text().contains("503"));

    let history = rag.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].error.as_deref().unwrap().contains("503"));
    assert_eq!(history[0].sources[0].filename, "power.txt");
}

#[tokio::test]
async fn test_search_without_rerank_uses_fused_order() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_manual(dir.path());
    // The encoder would push valve text first; rerank=false must bypass it
    let rag = pipeline(dir.path(), Some(KeywordEncoder { keyword: "valve" }), CannedGenerator);
    rag.ingest(vec![docs]).await.unwrap();

    let fused = rag.search("solar battery", Some(2), false).await.unwrap();
    assert_eq!(fused.len(), 2);
    assert_eq!(fused[0].chunk.metadata.filename, "power.txt");

    let reranked = rag.search("solar battery", Some(1), true).await.unwrap();
    assert_eq!(reranked[0].chunk.metadata.filename, "valves.txt");
}

#[tokio::test]
async fn test_index_survives_restart_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_manual(dir.path());

    let first = pipeline::<KeywordEncoder, _>(dir.path(), None, CannedGenerator);
    let report = first.ingest(vec![docs]).await.unwrap();
    assert!(dir.path().join("vector_store").join("index.json").exists());
    assert!(dir.path().join("vector_store").join("chunks.json").exists());

    let restarted = pipeline::<KeywordEncoder, _>(dir.path(), None, CannedGenerator);
    assert!(restarted.load().unwrap());
    assert_eq!(restarted.stats().chunks, report.chunk_count);
    let results = restarted.search("pressure valve", Some(3), false).await.unwrap();
    assert!(!results.is_empty());

    restarted.clear_index().unwrap();
    restarted.clear_index().unwrap();
    let err = restarted.ask("pump").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<RagError>(), Some(RagError::IndexNotReady)));

    let after_clear = pipeline::<KeywordEncoder, _>(dir.path(), None, CannedGenerator);
    assert!(!after_clear.load().unwrap());
}

#[tokio::test]
async fn test_settings_update_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let rag = pipeline::<KeywordEncoder, _>(dir.path(), None, CannedGenerator);

    let updated = rag
        .update_settings(RetrievalConfigUpdate {
            bm25_weight: Some(0.6),
            memory_window: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(updated.bm25_weight, 0.6);
    assert_eq!(updated.memory_window, 2);

    // One bad field rejects the whole update
    assert!(rag
        .update_settings(RetrievalConfigUpdate {
            top_k_rerank: Some(3),
            temperature: Some(-1.0),
            ..Default::default()
        })
        .is_err());
    assert_eq!(rag.settings(), updated);
}

#[test]
fn test_hybrid_weight_moves_between_dense_and_lexical() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = vec![
        chunk("a.txt", "1_0", "grid tie inverter wiring"),
        chunk("b.txt", "1_0", "battery"),
        chunk("c.txt", "1_0", "battery charger"),
    ];
    // b.txt sits on the query vector; only a.txt shares the query's words
    let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
    let mut index = VectorIndex::new(dir.path());
    index.build(vectors, chunks).unwrap();
    let retriever = HybridRetriever::new(index);

    let query = [1.0, 0.0];
    let dense_only = retriever.search(&query, "inverter wiring", 3, 0.0).unwrap();
    let order: Vec<&str> = dense_only
        .iter()
        .map(|r| r.chunk.metadata.source.as_str())
        .collect();
    assert_eq!(order, vec!["b.txt", "c.txt", "a.txt"]);

    let lexical_only = retriever.search(&query, "inverter wiring", 3, 1.0).unwrap();
    assert_eq!(lexical_only[0].chunk.metadata.source, "a.txt");

    // Same chunk_id in three files stays three results
    assert_eq!(lexical_only.len(), 3);
}

use std::sync::Arc;

use crate::config::Config;
use crate::extract::PlainTextExtractor;
use crate::llm::cross_encoder::HttpCrossEncoder;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::generate::HttpGenerator;
use crate::pipeline::RagPipeline;

/// The pipeline wired to the HTTP collaborators.
pub type DocPipeline = RagPipeline<HttpEmbedder, HttpCrossEncoder, HttpGenerator>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<DocPipeline>,
    /// Single permit: ingestion, search and answering run one at a time.
    pub request_gate: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.chunking.validate()?;
        config.retrieval.validate()?;

        // Ensure data directories exist
        std::fs::create_dir_all(config.vector_dir())?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let cross_encoder = HttpCrossEncoder::new(http_client.clone(), config.reranker.clone());
        let cross_encoder = if cross_encoder.is_configured() {
            Some(cross_encoder)
        } else {
            tracing::info!("No reranker configured; results keep their fused order");
            None
        };

        let pipeline = RagPipeline::new(
            HttpEmbedder::new(http_client.clone(), config.embedding.clone()),
            cross_encoder,
            HttpGenerator::new(http_client, config.generation.clone()),
            Arc::new(PlainTextExtractor::new(config.chunking.words_per_page)),
            config.chunking.clone(),
            config.retrieval.clone(),
            config.vector_dir(),
        );

        // A corrupt index should not stop the server; it can be re-ingested
        match pipeline.load() {
            Ok(true) => {}
            Ok(false) => tracing::info!("No persisted index; ingest documents to begin"),
            Err(e) => tracing::warn!("Ignoring persisted index: {e:#}"),
        }

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            request_gate: Arc::new(tokio::sync::Semaphore::new(1)),
        })
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the persisted index lives
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Chat-completion endpoint used for answers
    pub generation: GenerationConfig,
    /// Document chunking parameters
    pub chunking: ChunkingConfig,
    /// Initial values for the runtime-tunable retrieval settings
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub dim: usize,
    /// Prefix prepended to queries (not documents) for asymmetric models.
    pub query_instruction: String,
}

/// Configuration for the cross-encoder reranker sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, results keep their fused order.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL; requests go to `{base_url}/chat/completions`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub chunk_size: usize,
    /// Tokens repeated between consecutive chunks
    pub chunk_overlap: usize,
    /// Page size for formats without native pagination
    pub words_per_page: usize,
}

/// Settings read fresh at the start of every request. Each request works on
/// one snapshot, so a concurrent update only affects later requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched by hybrid retrieval
    pub top_k_retrieval: usize,
    /// Documents kept after reranking and placed in the prompt
    pub top_k_rerank: usize,
    /// Lexical share of the fused score (0.0 = dense only, 1.0 = BM25 only)
    pub bm25_weight: f32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Previous turns considered for the prompt
    pub memory_window: usize,
    /// Token cap over the windowed turns
    pub max_memory_tokens: usize,
}

/// Partial update for [`RetrievalConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrievalConfigUpdate {
    pub top_k_retrieval: Option<usize>,
    pub top_k_rerank: Option<usize>,
    pub bm25_weight: Option<f32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub memory_window: Option<usize>,
    pub max_memory_tokens: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            embedding: EmbeddingConfig::default(),
            reranker: RerankerConfig::default(),
            generation: GenerationConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "bge-base-en-v1.5".to_string(),
            api_key: None,
            dim: 768,
            query_instruction: "Represent this sentence for searching relevant passages: "
                .to_string(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://models.github.ai/inference".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            words_per_page: 500,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_retrieval: 20,
            top_k_rerank: 5,
            bm25_weight: 0.3,
            temperature: 0.1,
            max_tokens: 1024,
            memory_window: 5,
            max_memory_tokens: 2000,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.bm25_weight) {
            return Err(RagError::InvalidConfig(format!(
                "bm25_weight must be within [0, 1], got {}",
                self.bm25_weight
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::InvalidConfig(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.top_k_retrieval == 0 || self.top_k_rerank == 0 {
            return Err(RagError::InvalidConfig(
                "top_k_retrieval and top_k_rerank must be at least 1".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(RagError::InvalidConfig(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update. Nothing changes unless the result validates.
    pub fn apply(&mut self, update: RetrievalConfigUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(v) = update.top_k_retrieval {
            next.top_k_retrieval = v;
        }
        if let Some(v) = update.top_k_rerank {
            next.top_k_rerank = v;
        }
        if let Some(v) = update.bm25_weight {
            next.bm25_weight = v;
        }
        if let Some(v) = update.temperature {
            next.temperature = v;
        }
        if let Some(v) = update.max_tokens {
            next.max_tokens = v;
        }
        if let Some(v) = update.memory_window {
            next.memory_window = v;
        }
        if let Some(v) = update.max_memory_tokens {
            next.max_memory_tokens = v;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.words_per_page == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size and words_per_page must be at least 1".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOC_QA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOC_QA_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Embeddings
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Some(dim) = env_parse("EMBEDDING_DIM") {
            config.embedding.dim = dim;
        }
        if let Ok(prefix) = std::env::var("EMBEDDING_QUERY_INSTRUCTION") {
            config.embedding.query_instruction = prefix;
        }

        // Reranker
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Some(v) = env_parse::<u64>("RERANKER_TIMEOUT_SECS") {
            config.reranker.timeout_secs = v.min(30); // Cap at 30s
        }

        // Generation
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.generation.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.generation.model = model;
        }
        if let Some(key) = std::env::var("LLM_API_KEY")
            .ok()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        {
            config.generation.api_key = Some(key);
        }
        if let Some(v) = env_parse("LLM_TIMEOUT_SECS") {
            config.generation.timeout_secs = v;
        }

        // Chunking
        if let Some(v) = env_parse("DOC_QA_CHUNK_SIZE") {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = env_parse("DOC_QA_CHUNK_OVERLAP") {
            config.chunking.chunk_overlap = v;
        }

        // Retrieval defaults
        if let Some(v) = env_parse("DOC_QA_TOP_K_RETRIEVAL") {
            config.retrieval.top_k_retrieval = v;
        }
        if let Some(v) = env_parse("DOC_QA_TOP_K_RERANK") {
            config.retrieval.top_k_rerank = v;
        }
        if let Some(v) = env_parse("DOC_QA_BM25_WEIGHT") {
            config.retrieval.bm25_weight = v;
        }
        if let Some(v) = env_parse("DOC_QA_TEMPERATURE") {
            config.retrieval.temperature = v;
        }
        if let Some(v) = env_parse("DOC_QA_MAX_TOKENS") {
            config.retrieval.max_tokens = v;
        }
        if let Some(v) = env_parse("DOC_QA_MEMORY_WINDOW") {
            config.retrieval.memory_window = v;
        }
        if let Some(v) = env_parse("DOC_QA_MAX_MEMORY_TOKENS") {
            config.retrieval.max_memory_tokens = v;
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vector_store")
    }
}

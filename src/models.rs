use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};
use crate::llm::generate::GenerationError;

/// Provenance attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Base name of the source file.
    pub filename: String,
    /// 1-based page number (synthetic for formats without pagination).
    pub page: u32,
    /// `"{page}_{index}"`, unique within one source.
    pub chunk_id: String,
    /// Full path the document was ingested from.
    pub source: String,
}

/// A bounded span of document text, the atomic retrievable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk, rejecting records that would be unusable downstream.
    pub fn new(content: String, metadata: ChunkMetadata) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(RagError::InvalidChunk(format!(
                "{} has empty content",
                metadata.chunk_id
            )));
        }
        if metadata.page == 0 {
            return Err(RagError::InvalidChunk(format!(
                "{} in {} has page 0 (pages are 1-based)",
                metadata.chunk_id, metadata.filename
            )));
        }
        if metadata.chunk_id.is_empty() || metadata.source.is_empty() {
            return Err(RagError::InvalidChunk(format!(
                "chunk from {} is missing its id or source",
                metadata.filename
            )));
        }
        Ok(Self { content, metadata })
    }

    /// Identity used to join dense and lexical results.
    ///
    /// `chunk_id` alone repeats across files (`1_0` exists in every document),
    /// so the source path is part of the key.
    pub fn key(&self) -> (&str, &str) {
        (&self.metadata.source, &self.metadata.chunk_id)
    }
}

/// A chunk with a stage-specific score. Scores from different stages are not
/// comparable with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Citation record returned alongside answers and kept in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub page: u32,
    pub chunk_id: String,
    pub source: String,
    pub score: f32,
    pub content: String,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(scored: &ScoredChunk) -> Self {
        let meta = &scored.chunk.metadata;
        Self {
            filename: meta.filename.clone(),
            page: meta.page,
            chunk_id: meta.chunk_id.clone(),
            source: meta.source.clone(),
            score: scored.score,
            content: scored.chunk.content.clone(),
        }
    }
}

/// One question/answer exchange. A failed generation is kept with its
/// sources and the failure in `error`; `answer` then holds the rendered error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub error: Option<String>,
    pub asked_at: DateTime<Utc>,
}

impl MemoryTurn {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            sources: Vec::new(),
            error: None,
            asked_at: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of one ask: generated text (or a typed failure) plus the sources
/// that were placed in the prompt. The two always travel together.
#[derive(Debug)]
pub struct Answer {
    pub outcome: std::result::Result<String, GenerationError>,
    pub sources: Vec<ScoredChunk>,
}

impl Answer {
    /// The memory record for this exchange, failed or not.
    pub fn to_turn(&self, question: &str) -> MemoryTurn {
        let turn = MemoryTurn::new(question, self.display_text()).with_sources(self.source_refs());
        match &self.outcome {
            Ok(_) => turn,
            Err(e) => turn.with_error(e.to_string()),
        }
    }

    /// Text suitable for display; failures are rendered inline.
    pub fn display_text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => format!("Error calling LLM API: {e}"),
        }
    }

    pub fn source_refs(&self) -> Vec<SourceRef> {
        self.sources.iter().map(SourceRef::from).collect()
    }
}

/// A single chat message in the order sent to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Per-file ingestion failure.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of an ingestion batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_indexed: usize,
    pub failures: Vec<IngestFailure>,
    pub chunk_count: usize,
}

/// Ingest request
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub paths: Vec<PathBuf>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    #[serde(default = "default_true")]
    pub rerank: bool,
}

fn default_true() -> bool {
    true
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SourceRef>,
}

/// Ask request
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Ask response. `error` is set when generation failed; `sources` are
/// returned either way.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub error: Option<String>,
    pub sources: Vec<SourceRef>,
}

/// Index and memory counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub documents: usize,
    pub chunks: usize,
    pub conversations: usize,
    pub index_ready: bool,
}

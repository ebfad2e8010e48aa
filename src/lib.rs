//! # doc-qa
//!
//! Question answering over a local document collection. Documents are split
//! into token-bounded chunks, indexed for both dense and lexical retrieval,
//! and answered by a chat model that sees only the best-matching chunks plus
//! a bounded window of the conversation so far.
//!
//! ## Architecture
//!
//! ```text
//!   files ──► extract ──► clean + split ──► embed ──► VectorIndex ──► disk
//!                                                         │      (index.json,
//!                                                         ▼       chunks.json)
//!                                                     Bm25Index
//!
//!                          ┌─────────────┐
//!                          │  Question    │
//!                          └──────┬───────┘
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!           ┌────────────────┐       ┌─────────────────┐
//!           │  Dense (L2)    │       │   BM25 Okapi    │
//!           │  1/(1+d²)      │       │  whole corpus   │
//!           └───────┬────────┘       └────────┬────────┘
//!                   │ min-max                 │ min-max
//!                   └────────────┬────────────┘
//!                                ▼
//!                  ┌───────────────────────┐
//!                  │  (1-α)·dense + α·bm25 │
//!                  │  top_k_retrieval      │
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  Cross-encoder rerank │
//!                  │  top_k_rerank         │
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │ Prompt: rules, memory │
//!                  │ window, documents     │
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  Chat completion      │
//!                  └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration and runtime-tunable retrieval settings
//! - [`models`] - Shared data types: `Chunk`, `ScoredChunk`, `MemoryTurn`, request/response types
//! - [`extract`] - Text extraction and input file discovery
//! - [`chunking`] - Text cleaning and token-budgeted splitting
//! - [`search::vector`] - Exact L2 vector index with disk persistence
//! - [`search::bm25`] - In-memory BM25 Okapi over the same chunk sequence
//! - [`search::hybrid`] - Min-max normalised score fusion
//! - [`search::rerank`] - Cross-encoder second pass
//! - [`llm`] - Embedding, cross-encoder and chat-completion clients, prompt assembly
//! - [`memory`] - Turn- and token-bounded conversation history
//! - [`pipeline`] - Ingestion and answering orchestration
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
pub mod tokens;

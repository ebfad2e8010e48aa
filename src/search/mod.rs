pub mod bm25;
pub mod hybrid;
pub mod rerank;
pub mod vector;

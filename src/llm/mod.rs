pub mod cross_encoder;
pub mod embeddings;
pub mod generate;
pub mod prompt;

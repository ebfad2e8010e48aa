//! Token counting with the cl100k_base BPE (GPT-4 / GPT-4o family).
//!
//! Used both for chunk sizing at ingestion and for the memory token budget,
//! so the two always agree on what a "token" is.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Cached encoder. `None` if initialisation failed; callers then fall back
/// to a character-based estimate.
static CL100K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    CL100K_BASE
        .get_or_init(|| match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                tracing::warn!("cl100k_base unavailable, estimating token counts: {e}");
                None
            }
        })
        .as_ref()
}

/// Count tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => estimate_token_count(text),
    }
}

/// Roughly four characters per token for English prose.
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

//! Document chunking: extracted pages in, provenance-tagged chunks out.

pub mod text;

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::models::{Chunk, ChunkMetadata};

pub use text::{clean_text, split_by_tokens};

/// Clean and split every page of one document.
///
/// Chunk ids are `"{page}_{index}"` with `index` counting from 0 within each
/// page. Pages that are empty after cleaning produce no chunks.
pub fn chunk_pages(
    path: &Path,
    pages: &BTreeMap<u32, String>,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let source = path.display().to_string();

    let mut chunks = Vec::new();
    for (&page, raw) in pages {
        let cleaned = clean_text(raw);
        if cleaned.is_empty() {
            continue;
        }

        for (index, content) in split_by_tokens(&cleaned, config.chunk_size, config.chunk_overlap)
            .into_iter()
            .enumerate()
        {
            chunks.push(Chunk::new(
                content,
                ChunkMetadata {
                    filename: filename.clone(),
                    page,
                    chunk_id: format!("{page}_{index}"),
                    source: source.clone(),
                },
            )?);
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pages(entries: &[(u32, &str)]) -> BTreeMap<u32, String> {
        entries.iter().map(|(p, t)| (*p, t.to_string())).collect()
    }

    #[test]
    fn test_chunk_metadata() {
        let path = PathBuf::from("/srv/docs/well-pump.txt");
        let chunks = chunk_pages(
            &path,
            &pages(&[(1, "Prime the pump."), (2, "Check the foot valve.")]),
            &ChunkingConfig::default(),
        )
        .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.filename, "well-pump.txt");
        assert_eq!(chunks[0].metadata.source, "/srv/docs/well-pump.txt");
        assert_eq!(chunks[0].metadata.chunk_id, "1_0");
        assert_eq!(chunks[1].metadata.page, 2);
        assert_eq!(chunks[1].metadata.chunk_id, "2_0");
    }

    #[test]
    fn test_empty_pages_are_skipped() {
        let chunks = chunk_pages(
            Path::new("a.txt"),
            &pages(&[(1, "  \n "), (2, "$$$ ###"), (3, "real text")]),
            &ChunkingConfig::default(),
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.chunk_id, "3_0");
    }

    #[test]
    fn test_long_page_gets_sequential_ids() {
        let config = ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 2,
            words_per_page: 500,
        };
        let long = "solar panels need regular cleaning in dusty climates. ".repeat(20);
        let chunks = chunk_pages(Path::new("solar.txt"), &pages(&[(4, &long)]), &config).unwrap();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_id, format!("4_{i}"));
        }
    }
}

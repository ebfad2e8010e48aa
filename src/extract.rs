//! Text extraction collaborator and input file discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{RagError, Result};

/// Maps a file to its text, keyed by 1-based page number.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor recognises the file's format.
    fn supports(&self, path: &Path) -> bool;

    /// Extract page texts. Unrecognised formats fail with
    /// [`RagError::UnsupportedFormat`].
    fn extract(&self, path: &Path) -> Result<BTreeMap<u32, String>>;
}

/// Extractor for plain-text formats. Pages are synthesised as fixed-size word
/// windows since these formats carry no pagination.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    words_per_page: usize,
}

impl PlainTextExtractor {
    pub fn new(words_per_page: usize) -> Self {
        Self {
            words_per_page: words_per_page.max(1),
        }
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new(500)
    }
}

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        matches!(
            extension(path).as_str(),
            "txt" | "text" | "md" | "markdown"
        )
    }

    fn extract(&self, path: &Path) -> Result<BTreeMap<u32, String>> {
        if !self.supports(path) {
            return Err(RagError::UnsupportedFormat(format!(
                "{} (.{})",
                path.display(),
                extension(path)
            )));
        }
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(paginate_words(&text, self.words_per_page))
    }
}

/// Group words into pages of `words_per_page`, numbered from 1.
pub fn paginate_words(text: &str, words_per_page: usize) -> BTreeMap<u32, String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_page.max(1))
        .enumerate()
        .map(|(i, page)| ((i + 1) as u32, page.join(" ")))
        .collect()
}

/// Expand `inputs` into a file list: files are kept as given (supported or
/// not, so unsupported ones surface as per-file failures), directories are
/// walked for files the extractor supports. Hidden entries are skipped.
pub fn collect_input_files(inputs: &[PathBuf], extractor: &dyn TextExtractor) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }

        for entry in WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && extractor.supports(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

//! Core types for page extraction and chunking.

use serde::{Deserialize, Serialize};

/// Text of one physical PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Extracted text (may be empty for image-only pages).
    pub text: String,

    /// 0-based page position in the document.
    pub page_index: u32,
}

impl PageRecord {
    /// Create a new page record.
    pub fn new(page_index: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_index,
        }
    }

    /// True when the page has no extractable text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A bounded slice of a single page, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text content of this chunk.
    pub text: String,

    /// 0-based index of the page the text came from.
    pub page_index: u32,

    /// Ordinal of this chunk across the whole document.
    pub chunk_sequence: u32,

    /// Character range in the page text (start, end), end exclusive.
    pub char_range: (usize, usize),
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(
        text: String,
        page_index: u32,
        chunk_sequence: u32,
        char_range: (usize, usize),
    ) -> Self {
        Self {
            text,
            page_index,
            chunk_sequence,
            char_range,
        }
    }

    /// 1-based page number, as shown to users.
    pub fn page_number(&self) -> u32 {
        self.page_index + 1
    }

    /// Get the length of the content in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Get a preview of the content (first N characters).
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}

/// Identity of the document an index was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// File name of the source PDF (no directories).
    pub file_name: String,

    /// SHA256 of the PDF bytes.
    pub content_hash: String,

    /// Number of physical pages.
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_is_one_based() {
        let chunk = Chunk::new("text".to_string(), 0, 0, (0, 4));
        assert_eq!(chunk.page_number(), 1);
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let chunk = Chunk::new("héllo wörld".to_string(), 2, 7, (0, 11));
        assert_eq!(chunk.preview(2), "hé");
        assert_eq!(chunk.preview(100), "héllo wörld");
        assert_eq!(chunk.char_count(), 11);
    }

    #[test]
    fn test_blank_page() {
        assert!(PageRecord::new(0, "  \n\t").is_blank());
        assert!(!PageRecord::new(1, "Syllabus").is_blank());
    }
}

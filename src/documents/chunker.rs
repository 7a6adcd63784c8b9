//! Page chunking strategies.
//!
//! Provides the `Chunker` trait and the recursive splitter used for PDF
//! pages. Chunks never cross a page boundary, so every chunk stays
//! attributable to exactly one page.

use super::config::ChunkingConfig;
use super::types::{Chunk, PageRecord};

/// A raw chunk before being attributed to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Character range in the source text (start, end).
    pub char_range: (usize, usize),

    /// The text content of this chunk.
    pub content: String,
}

impl RawChunk {
    /// Create a new raw chunk.
    pub fn new(char_range: (usize, usize), content: String) -> Self {
        Self {
            char_range,
            content,
        }
    }

    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Trait for page chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split the text of a single page into chunks.
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;

    /// Chunk every page in order, numbering chunks across the document.
    fn chunk_pages(&self, pages: &[PageRecord], config: &ChunkingConfig) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for raw in self.chunk(&page.text, config) {
                let sequence = chunks.len() as u32;
                chunks.push(Chunk::new(
                    raw.content,
                    page.page_index,
                    sequence,
                    raw.char_range,
                ));
            }
        }

        tracing::debug!(
            target: "chunker",
            "{} pages -> {} chunks",
            pages.len(),
            chunks.len()
        );
        chunks
    }
}

/// Cut points in order of preference: paragraph, line, word.
const SEPARATORS: [&[char]; 3] = [&['\n', '\n'], &['\n'], &[' ']];

/// Recursive character splitter.
///
/// Algorithm:
/// 1. Pages that fit in `max_chunk_chars` become a single chunk
/// 2. Otherwise take a window of at most `max_chunk_chars`
/// 3. Cut it at the last paragraph break, else line break, else space,
///    else hard at the window edge
/// 4. Start the next window `overlap_chars` before the cut
/// 5. A window that would hold only whitespace is skipped up to the next
///    visible character, so gaps between chunks are always whitespace
#[derive(Debug, Default)]
pub struct RecursiveChunker;

impl RecursiveChunker {
    /// Create a new recursive chunker.
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = content.chars().collect();
        let max_chars = config.max_chunk_chars.max(1);
        let overlap = config.overlap_chars.min(max_chars - 1);

        split_windows(&chars, max_chars, overlap)
            .into_iter()
            .map(|(start, end)| RawChunk::new((start, end), chars[start..end].iter().collect()))
            .collect()
    }
}

/// Compute window ranges. Each cut lies past `start + overlap`, so the next
/// window always starts after the previous one. No window is blank.
fn split_windows(chars: &[char], max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let limit = (start + max_chars).min(len);
        if chars[start..limit].iter().all(|c| c.is_whitespace()) {
            match chars[limit..].iter().position(|c| !c.is_whitespace()) {
                Some(offset) => {
                    start = limit + offset;
                    continue;
                }
                None => break,
            }
        }
        if limit == len {
            windows.push((start, len));
            break;
        }

        let end = find_break(chars, start + overlap + 1, limit).unwrap_or(limit);
        windows.push((start, end));
        start = end - overlap;
    }

    windows
}

/// Last separator end within `min_end..=limit`, trying coarser separators first.
fn find_break(chars: &[char], min_end: usize, limit: usize) -> Option<usize> {
    SEPARATORS.iter().find_map(|sep| {
        (min_end..=limit)
            .rev()
            .find(|&end| end >= sep.len() && chars[end - sep.len()..end] == **sep)
    })
}

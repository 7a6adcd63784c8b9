//! Document loading and chunking for question answering.
//!
//! This module provides:
//! - PDF page extraction
//! - Page-attributed chunking with overlap
//! - The page, chunk and document identity types shared with the index

pub mod chunker;
pub mod config;
pub mod loader;
pub mod types;

pub use chunker::{Chunker, RawChunk, RecursiveChunker};
pub use config::ChunkingConfig;
pub use loader::{DocumentLoader, LoadError, PdfLoader, read_document};
pub use types::{Chunk, DocumentInfo, PageRecord};

//! PDF page extraction.
//!
//! Reads a PDF and produces one `PageRecord` per physical page in page
//! order. There is no OCR: image-only pages come back with empty text.

use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;

use super::types::PageRecord;

/// Errors from document loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Document not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a readable PDF ({}): {reason}", path.display())]
    InvalidPdf { path: PathBuf, reason: String },
}

/// Trait for turning a document into page records.
pub trait DocumentLoader: Send + Sync {
    /// Parse already-read document bytes. `origin` is used for error messages.
    fn load_bytes(&self, bytes: &[u8], origin: &Path) -> Result<Vec<PageRecord>, LoadError>;

    /// Read and parse a document from disk.
    fn load(&self, path: &Path) -> Result<Vec<PageRecord>, LoadError> {
        let bytes = read_document(path)?;
        self.load_bytes(&bytes, path)
    }
}

/// Read raw document bytes, mapping a missing file to `LoadError::NotFound`.
pub fn read_document(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// PDF loader backed by lopdf text extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new PDF loader.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for PdfLoader {
    fn load_bytes(&self, bytes: &[u8], origin: &Path) -> Result<Vec<PageRecord>, LoadError> {
        let document = Document::load_mem(bytes).map_err(|e| LoadError::InvalidPdf {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        // get_pages is keyed by 1-based page number, already in page order
        let pages = document.get_pages();
        let mut records = Vec::with_capacity(pages.len());

        for (position, page_number) in pages.keys().enumerate() {
            let text = match document.extract_text(&[*page_number]) {
                Ok(text) => normalize_page_text(&text),
                Err(e) => {
                    tracing::warn!(
                        target: "loader",
                        "page {page_number} of {}: no extractable text ({e})",
                        origin.display()
                    );
                    String::new()
                }
            };
            records.push(PageRecord::new(position as u32, text));
        }

        let blank = records.iter().filter(|p| p.is_blank()).count();
        tracing::info!(
            target: "loader",
            "loaded {} pages from {} ({blank} without text)",
            records.len(),
            origin.display()
        );

        Ok(records)
    }
}

/// Unify line endings and drop trailing whitespace.
fn normalize_page_text(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n").trim_end().to_string()
}

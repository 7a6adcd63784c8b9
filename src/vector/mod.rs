//! Persistent vector index for the currently ingested document.
//!
//! The index lives in one directory per generation; a `CURRENT` pointer file
//! names the live one. See [`VectorStore`] for the rebuild protocol.

pub mod index;
pub mod persistence;
pub mod similarity;
pub mod store;

pub use index::{SearchHit, VectorIndex};
pub use persistence::{FORMAT_VERSION, IndexManifest};
pub use similarity::cosine_similarity;
pub use store::VectorStore;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the vector store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error in '{path}': {reason}")]
    Serialization { path: PathBuf, reason: String },

    #[error("Cannot index {chunks} chunks with {embeddings} embeddings")]
    LengthMismatch { chunks: usize, embeddings: usize },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index is corrupted: {reason}")]
    Corrupted { reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

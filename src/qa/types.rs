//! Results and progress events produced by a [`QaSession`](super::QaSession).

use serde::{Deserialize, Serialize};

use crate::vector::{IndexManifest, SearchHit};

/// Answer to one question, with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,

    /// 1-based page numbers of the retrieved chunks, ascending, no duplicates.
    pub source_pages: Vec<u32>,

    /// Retrieved chunk texts joined by blank lines, as sent to the model.
    pub context: String,

    /// Retrieved chunks with their similarity scores, best first.
    pub matches: Vec<SearchHit>,
}

/// What an ingest did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub manifest: IndexManifest,

    /// True when the document was already indexed and the rebuild was skipped.
    pub skipped: bool,
}

/// Ingest progress, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestProgress {
    Loaded { pages: usize },
    Chunked { chunks: usize },
    Embedded { done: usize, total: usize },
    Persisted { generation: u64 },
}

/// Session phase as reported to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    Indexing,
    Ready,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
        }
    }
}

/// Snapshot of a session and its on-disk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,

    /// Manifest of the index on disk, loaded or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<IndexManifest>,
}

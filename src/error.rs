//! Crate-level error type and machine-readable error codes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::LoadError;
use crate::remote::RemoteServiceError;
use crate::vector::StoreError;

/// Errors surfaced by [`QaSession`](crate::qa::QaSession) operations.
#[derive(Error, Debug)]
pub enum QaError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Remote(#[from] RemoteServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No document is ready for questions: {reason}")]
    NotReady { reason: String },

    #[error("Another ingest is already running")]
    IngestInProgress,

    #[error("Invalid question: {reason}")]
    InvalidQuery { reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl QaError {
    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Load(_) | Self::Io { .. } => ErrorCode::IoError,
            Self::Remote(_) => ErrorCode::RemoteServiceError,
            Self::Store(_) => ErrorCode::StorageError,
            Self::NotReady { .. } => ErrorCode::NotReady,
            Self::IngestInProgress => ErrorCode::Busy,
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            Self::Config { .. } => ErrorCode::ConfigError,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    pub(crate) fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }
}

pub type QaResult<T> = Result<T, QaError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    IoError,
    RemoteServiceError,
    NotReady,
    Busy,
    InvalidQuery,
    StorageError,
    ConfigError,
    Internal,
}

impl ErrorCode {
    /// Convert to string for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoError => "IO_ERROR",
            Self::RemoteServiceError => "REMOTE_SERVICE_ERROR",
            Self::NotReady => "NOT_READY",
            Self::Busy => "BUSY",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::StorageError => "STORAGE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::ConfigError => 2,
            Self::IoError => 3,
            Self::RemoteServiceError => 4,
            Self::NotReady => 5,
            Self::Busy => 6,
            Self::InvalidQuery => 7,
            Self::StorageError => 8,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Question answering over a single PDF document.
//!
//! A PDF is split into page-attributed chunks, embedded through a remote
//! OpenAI-compatible API and stored in an on-disk vector index. Questions are
//! answered by retrieving the closest chunks and handing them to a remote chat
//! model together with the question.
//!
//! The entry point is [`QaSession`]:
//!
//! ```ignore
//! let settings = docqa::Settings::load()?;
//! let session = docqa::QaSession::from_settings(&settings)?;
//! session.ingest(Path::new("syllabus.pdf"), false).await?;
//! let result = session.query("What happens if I am absent?").await?;
//! println!("{} (pages {:?})", result.answer, result.source_pages);
//! ```

pub mod cli;
pub mod config;
pub mod documents;
pub mod error;
pub mod logging;
pub mod qa;
pub mod remote;
#[cfg(feature = "http-server")]
pub mod server;
pub mod utils;
pub mod vector;

pub use config::Settings;
pub use documents::{Chunk, ChunkingConfig, PageRecord};
pub use error::{ErrorCode, QaError, QaResult};
pub use qa::{QaSession, QueryResult, SessionOptions};
pub use remote::{ChatProvider, EmbeddingProvider, RemoteServiceError};
pub use vector::{VectorIndex, VectorStore};

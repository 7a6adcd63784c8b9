//! Retrieval-augmented question answering over one ingested document.

pub mod prompt;
pub mod session;
pub mod types;

pub use prompt::{DEFAULT_TEMPLATE, PromptTemplate};
pub use session::{QaSession, SessionOptions};
pub use types::{IngestProgress, IngestReport, QueryResult, SessionPhase, SessionStatus};

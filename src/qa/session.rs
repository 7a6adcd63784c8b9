//! Question-answering session: ingest a document, then answer questions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::prompt::PromptTemplate;
use super::types::{IngestProgress, IngestReport, QueryResult, SessionPhase, SessionStatus};
use crate::config::Settings;
use crate::documents::{
    Chunker, ChunkingConfig, DocumentInfo, DocumentLoader, PageRecord, PdfLoader,
    RecursiveChunker, read_document,
};
use crate::error::{QaError, QaResult};
use crate::remote::{
    ChatProvider, ChatRequest, EmbeddingProvider, OpenAiChat, OpenAiEmbeddings, RemoteEndpoint,
    RemoteServiceError, RetryPolicy, embed_in_batches,
};
use crate::utils::content_hash;
use crate::vector::{IndexManifest, SearchHit, VectorIndex, VectorStore};
use crate::{debug_event, log_event};

/// Tunables for a [`QaSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory owned by this session's vector store.
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding_batch_size: usize,
    pub top_k: usize,
    /// Hits below this score are dropped, except the best one.
    pub min_score: f32,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub prompt: PromptTemplate,
}

impl SessionOptions {
    /// Defaults for an index at `index_dir`.
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        let settings = Settings::default();
        Self {
            index_dir: index_dir.into(),
            chunking: settings.chunking,
            embedding_batch_size: settings.embedding.batch_size,
            top_k: settings.retrieval.top_k,
            min_score: settings.retrieval.min_score,
            temperature: settings.generation.temperature,
            max_tokens: settings.generation.max_tokens,
            prompt: PromptTemplate::default(),
        }
    }

    /// Validated options from loaded settings.
    pub fn from_settings(settings: &Settings) -> QaResult<Self> {
        settings
            .validate()
            .map_err(|reason| QaError::Config { reason })?;
        let prompt = PromptTemplate::from_option(settings.generation.prompt_template.as_deref())
            .map_err(|reason| QaError::Config { reason })?;

        Ok(Self {
            index_dir: settings.index_dir(),
            chunking: settings.chunking.clone(),
            embedding_batch_size: settings.embedding.batch_size,
            top_k: settings.retrieval.top_k,
            min_score: settings.retrieval.min_score,
            temperature: settings.generation.temperature,
            max_tokens: settings.generation.max_tokens,
            prompt,
        })
    }
}

/// Lifecycle of the session's index.
enum SessionState {
    /// Nothing loaded; a query may still lazy-load from disk.
    Empty,
    /// An ingest is running; queries are rejected.
    Indexing,
    /// Index loaded and queryable.
    Ready(Arc<VectorIndex>),
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            Self::Empty => SessionPhase::Empty,
            Self::Indexing => SessionPhase::Indexing,
            Self::Ready(_) => SessionPhase::Ready,
        }
    }
}

/// Ingests one document at a time and answers questions about it.
///
/// Each session owns its index directory. Ingest is single-flight: a second
/// call while one is running fails with [`QaError::IngestInProgress`].
pub struct QaSession {
    options: SessionOptions,
    store: VectorStore,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    state: RwLock<SessionState>,
    ingest_lock: Mutex<()>,
}

impl QaSession {
    /// Create a session with the PDF loader and recursive chunker.
    pub fn new(
        options: SessionOptions,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            store: VectorStore::new(options.index_dir.clone()),
            options,
            loader: Arc::new(PdfLoader::new()),
            chunker: Arc::new(RecursiveChunker::new()),
            embedder,
            chat,
            state: RwLock::new(SessionState::Empty),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Create a session talking to the configured remote APIs.
    pub fn from_settings(settings: &Settings) -> QaResult<Self> {
        let options = SessionOptions::from_settings(settings)?;
        let endpoint = RemoteEndpoint::from_config(&settings.remote);
        let policy = RetryPolicy::from_config(&settings.remote);

        let embedder =
            OpenAiEmbeddings::new(endpoint.clone(), &settings.embedding.model, policy.clone())?;
        let chat = OpenAiChat::new(endpoint, &settings.generation.model, policy)?;

        Ok(Self::new(options, Arc::new(embedder), Arc::new(chat)))
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Index the PDF at `path`, replacing any previous document.
    pub async fn ingest(&self, path: &Path, force: bool) -> QaResult<IngestReport> {
        self.ingest_with_progress(path, force, |_| {}).await
    }

    /// [`ingest`](Self::ingest) with progress events.
    ///
    /// On failure the session becomes `Empty`. The previous index stays on
    /// disk and is lazily reloaded by the next query.
    pub async fn ingest_with_progress<F>(
        &self,
        path: &Path,
        force: bool,
        mut on_progress: F,
    ) -> QaResult<IngestReport>
    where
        F: FnMut(IngestProgress) + Send,
    {
        let _guard = self
            .ingest_lock
            .try_lock()
            .map_err(|_| QaError::IngestInProgress)?;

        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Indexing);
        let previous = match previous {
            SessionState::Ready(index) => Some(index),
            _ => None,
        };
        let indexing = IndexingGuard::new(&self.state, path);

        match self
            .run_ingest(path, force, previous, &mut on_progress)
            .await
        {
            Ok((index, report)) => {
                indexing.finish(SessionState::Ready(index));
                Ok(report)
            }
            Err(e) => {
                indexing.finish(SessionState::Empty);
                tracing::warn!(target: "session", "ingest of {} failed: {e}", path.display());
                Err(e)
            }
        }
    }

    async fn run_ingest<F>(
        &self,
        path: &Path,
        force: bool,
        previous: Option<Arc<VectorIndex>>,
        on_progress: &mut F,
    ) -> QaResult<(Arc<VectorIndex>, IngestReport)>
    where
        F: FnMut(IngestProgress) + Send,
    {
        let (pages, document, current) = self.load_document(path).await?;
        on_progress(IngestProgress::Loaded { pages: pages.len() });

        if !force {
            if let Some(manifest) = current.filter(|m| self.is_same_index(m, &document)) {
                let index = match previous {
                    Some(index) if index.manifest().generation == manifest.generation => index,
                    _ => Arc::new(self.load_store().await?.ok_or_else(|| {
                        QaError::not_ready("index disappeared while ingesting")
                    })?),
                };
                log_event!(
                    "session",
                    "unchanged",
                    "{} already indexed as generation {}",
                    document.file_name,
                    manifest.generation
                );
                return Ok((
                    index,
                    IngestReport {
                        manifest,
                        skipped: true,
                    },
                ));
            }
        }

        let chunks = self.chunker.chunk_pages(&pages, &self.options.chunking);
        on_progress(IngestProgress::Chunked {
            chunks: chunks.len(),
        });

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_in_batches(
            self.embedder.as_ref(),
            &texts,
            self.options.embedding_batch_size,
            |done, total| on_progress(IngestProgress::Embedded { done, total }),
        )
        .await?;

        let store = self.store.clone();
        let model = self.embedder.model().to_string();
        let index = tokio::task::spawn_blocking(move || {
            store.rebuild(document, &model, chunks, embeddings)
        })
        .await
        .map_err(join_error)??;

        let manifest = index.manifest().clone();
        on_progress(IngestProgress::Persisted {
            generation: manifest.generation,
        });
        log_event!(
            "session",
            "ingested",
            "{} ({} pages, {} chunks)",
            manifest.document.file_name,
            manifest.page_count,
            manifest.chunk_count
        );

        Ok((
            Arc::new(index),
            IngestReport {
                manifest,
                skipped: false,
            },
        ))
    }

    /// Read and parse the PDF off the async runtime, together with the
    /// manifest of whatever is indexed right now.
    async fn load_document(
        &self,
        path: &Path,
    ) -> QaResult<(Vec<PageRecord>, DocumentInfo, Option<IndexManifest>)> {
        let path = path.to_path_buf();
        let loader = Arc::clone(&self.loader);
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || -> QaResult<_> {
            let bytes = read_document(&path)?;
            let pages = loader.load_bytes(&bytes, &path)?;
            let document = DocumentInfo {
                file_name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                content_hash: content_hash(&bytes),
                page_count: pages.len(),
            };

            let current = match store.read_manifest() {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(target: "session", "ignoring unreadable index: {e}");
                    None
                }
            };
            Ok((pages, document, current))
        })
        .await
        .map_err(join_error)?
    }

    fn is_same_index(&self, manifest: &IndexManifest, document: &DocumentInfo) -> bool {
        manifest.document.content_hash == document.content_hash
            && manifest.embedding_model == self.embedder.model()
    }

    async fn load_store(&self) -> QaResult<Option<VectorIndex>> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(join_error)??)
    }

    /// The loaded index, lazily reading it from disk when the session is empty.
    async fn ready_index(&self) -> QaResult<Arc<VectorIndex>> {
        if let Some(index) = self.current_index()? {
            return Ok(index);
        }

        let Some(loaded) = self.load_store().await? else {
            return Err(QaError::not_ready("no document has been ingested yet"));
        };

        let mut state = self.state.write();
        match &*state {
            SessionState::Ready(index) => Ok(Arc::clone(index)),
            SessionState::Indexing => Err(QaError::not_ready("a document is being ingested")),
            SessionState::Empty => {
                debug_event!(
                    "session",
                    "lazy-loaded",
                    "generation {}",
                    loaded.manifest().generation
                );
                let index = Arc::new(loaded);
                *state = SessionState::Ready(Arc::clone(&index));
                Ok(index)
            }
        }
    }

    /// The index held in memory, `None` when the session is empty.
    fn current_index(&self) -> QaResult<Option<Arc<VectorIndex>>> {
        match &*self.state.read() {
            SessionState::Ready(index) => Ok(Some(Arc::clone(index))),
            SessionState::Indexing => Err(QaError::not_ready("a document is being ingested")),
            SessionState::Empty => Ok(None),
        }
    }

    /// Answer `question` from the ingested document.
    pub async fn query(&self, question: &str) -> QaResult<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::InvalidQuery {
                reason: "question is empty".to_string(),
            });
        }

        let index = self.ready_index().await?;
        if index.manifest().embedding_model != self.embedder.model() {
            tracing::warn!(
                target: "session",
                "index was built with {}, querying with {}",
                index.manifest().embedding_model,
                self.embedder.model()
            );
        }

        let query_vector = self
            .embedder
            .embed_batch(&[question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RemoteServiceError::InvalidResponse {
                service: "embeddings",
                reason: "no embedding returned for the question".to_string(),
            })?;

        let hits = index.search(&query_vector, self.options.top_k)?;
        let matches = keep_relevant(hits, self.options.min_score);
        debug_event!("session", "retrieved", "{} chunks", matches.len());

        let context = matches
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let source_pages = source_pages(&matches);

        let prompt = self.options.prompt.render(&context, question);
        let answer = self
            .chat
            .complete(&ChatRequest {
                prompt: &prompt,
                temperature: self.options.temperature,
                max_tokens: self.options.max_tokens,
            })
            .await?;

        Ok(QueryResult {
            answer,
            source_pages,
            context,
            matches,
        })
    }

    /// Current phase and the manifest of the index on disk.
    pub async fn status(&self) -> SessionStatus {
        let (phase, loaded) = {
            let state = self.state.read();
            let loaded = match &*state {
                SessionState::Ready(index) => Some(index.manifest().clone()),
                _ => None,
            };
            (state.phase(), loaded)
        };

        let manifest = match loaded {
            Some(manifest) => Some(manifest),
            None => self.store.read_manifest().unwrap_or_else(|e| {
                tracing::warn!(target: "session", "cannot read index manifest: {e}");
                None
            }),
        };

        SessionStatus { phase, manifest }
    }
}

/// Holds the session in `Indexing` for the duration of one ingest.
///
/// If the ingest future is dropped before [`finish`](Self::finish), the
/// session falls back to `Empty` and the next query reloads from disk.
struct IndexingGuard<'a> {
    state: &'a RwLock<SessionState>,
    path: &'a Path,
    done: bool,
}

impl<'a> IndexingGuard<'a> {
    fn new(state: &'a RwLock<SessionState>, path: &'a Path) -> Self {
        Self {
            state,
            path,
            done: false,
        }
    }

    fn finish(mut self, next: SessionState) {
        *self.state.write() = next;
        self.done = true;
    }
}

impl Drop for IndexingGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.write() = SessionState::Empty;
            tracing::warn!(
                target: "session",
                "ingest of {} was cancelled",
                self.path.display()
            );
        }
    }
}

/// Drop weak hits, always keeping the best one.
fn keep_relevant(hits: Vec<SearchHit>, min_score: f32) -> Vec<SearchHit> {
    let mut hits = hits.into_iter();
    match hits.next() {
        Some(best) => std::iter::once(best)
            .chain(hits.filter(|hit| hit.score >= min_score))
            .collect(),
        None => Vec::new(),
    }
}

/// Sorted, de-duplicated 1-based page numbers.
fn source_pages(hits: &[SearchHit]) -> Vec<u32> {
    hits.iter()
        .map(|hit| hit.chunk.page_number())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn join_error(e: tokio::task::JoinError) -> QaError {
    QaError::Internal {
        reason: format!("background task failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Chunk;

    fn hit(page_index: u32, score: f32) -> SearchHit {
        SearchHit {
            chunk: Chunk::new(format!("page {page_index}"), page_index, 0, (0, 6)),
            score,
        }
    }

    #[test]
    fn test_keep_relevant_always_keeps_best() {
        let kept = keep_relevant(vec![hit(0, 0.2), hit(1, 0.1)], 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk.page_index, 0);

        let kept = keep_relevant(vec![hit(0, 0.9), hit(1, 0.6), hit(2, 0.4)], 0.5);
        assert_eq!(kept.len(), 2);

        assert!(keep_relevant(Vec::new(), 0.5).is_empty());
    }

    #[test]
    fn test_source_pages_sorted_unique_one_based() {
        let pages = source_pages(&[hit(4, 0.9), hit(0, 0.8), hit(4, 0.7), hit(2, 0.6)]);
        assert_eq!(pages, vec![1, 3, 5]);
    }

    #[test]
    fn test_options_from_settings_rejects_invalid_config() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        let err = SessionOptions::from_settings(&settings).unwrap_err();
        assert!(matches!(err, QaError::Config { .. }));
    }
}

//! Shared fixtures: tiny PDFs and deterministic stand-ins for the remote APIs.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa::qa::SessionOptions;
use docqa::remote::{ChatProvider, ChatRequest, EmbeddingProvider, RemoteServiceError};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tokio::sync::Notify;

/// Write a PDF with one line of Courier text per page. Empty strings give
/// pages without any text.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Write a PDF into `dir` and return its path.
pub fn pdf_in(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(name);
    write_pdf(&path, pages);
    path
}

pub const SYLLABUS_PAGES: [&str; 2] = [
    "Absences result in a grade penalty.",
    "Library hours run from nine until late evening.",
];

const DIMENSIONS: usize = 4096;

/// Hashes character trigrams of each word into a fixed-size vector.
///
/// Texts sharing word fragments get a positive cosine similarity; texts with
/// disjoint vocabularies are (almost) orthogonal.
pub struct TrigramEmbedder {
    calls: AtomicUsize,
}

impl TrigramEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let mut hash: u64 = 0xcbf29ce484222325;
                for c in gram {
                    hash ^= *c as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                vector[(hash % DIMENSIONS as u64) as usize] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for TrigramEmbedder {
    fn model(&self) -> &str {
        "trigram-hash"
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RemoteServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|t| Self::embed_text(t)).collect())
    }
}

/// Embedder whose first call blocks until `release` is notified.
pub struct GatedEmbedder {
    inner: TrigramEmbedder,
    pub entered: Notify,
    pub release: Notify,
    gated: AtomicBool,
}

impl GatedEmbedder {
    pub fn new() -> Self {
        Self {
            inner: TrigramEmbedder::new(),
            entered: Notify::new(),
            release: Notify::new(),
            gated: AtomicBool::new(true),
        }
    }

    /// Starts without a gate; use [`close`](Self::close) to arm it.
    pub fn open() -> Self {
        let embedder = Self::new();
        embedder.gated.store(false, Ordering::SeqCst);
        embedder
    }

    /// Block the next call again.
    pub fn close(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RemoteServiceError> {
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.embed_batch(inputs).await
    }
}

/// Chat stand-in that records every prompt and answers with a fixed string.
pub struct RecordingChat {
    prompts: Mutex<Vec<String>>,
}

pub const CANNED_ANSWER: &str = "You lose points for absences.";

impl RecordingChat {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for RecordingChat {
    fn model(&self) -> &str {
        "recording-chat"
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, RemoteServiceError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        Ok(CANNED_ANSWER.to_string())
    }
}

/// Session options tuned for [`TrigramEmbedder`] similarity levels.
pub fn test_options(index_dir: &Path) -> SessionOptions {
    SessionOptions {
        min_score: 0.1,
        ..SessionOptions::new(index_dir)
    }
}

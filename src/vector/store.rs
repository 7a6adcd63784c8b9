//! Generation-based vector store rooted at a fixed directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::index::VectorIndex;
use super::persistence::{
    self, GENERATIONS_DIR, IndexManifest, STAGING_PREFIX, generation_dir_name, generation_path,
    parse_generation_dir_name,
};
use super::{StoreError, StoreResult};
use crate::documents::{Chunk, DocumentInfo};

/// Handle to the on-disk index directory.
///
/// A rebuild never modifies the live generation. It writes a new generation
/// into a staging directory, renames it into `generations/`, then swaps the
/// `CURRENT` pointer. Readers therefore see either the old index or the new
/// one, never a mix.
///
/// Clones share a writer lock, so rebuilds through one store never
/// interleave even when an abandoned rebuild is still finishing.
#[derive(Debug, Clone)]
pub struct VectorStore {
    root: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl VectorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the live generation, if the pointer names one.
    pub fn current_generation_dir(&self) -> StoreResult<Option<PathBuf>> {
        Ok(persistence::read_current(&self.root)?.map(|name| generation_path(&self.root, &name)))
    }

    /// True when a live generation is present on disk.
    pub fn exists(&self) -> bool {
        matches!(self.current_generation_dir(), Ok(Some(dir)) if dir.is_dir())
    }

    /// Manifest of the live generation without loading its vectors.
    pub fn read_manifest(&self) -> StoreResult<Option<IndexManifest>> {
        match self.current_generation_dir()? {
            Some(dir) => persistence::read_manifest(&dir).map(Some),
            None => Ok(None),
        }
    }

    /// Load the live generation. `Ok(None)` when nothing was ever indexed.
    pub fn load(&self) -> StoreResult<Option<VectorIndex>> {
        let Some(dir) = self.current_generation_dir()? else {
            return Ok(None);
        };
        let index = persistence::read_generation(&dir)?;
        tracing::debug!(
            target: "store",
            "loaded generation {} ({} chunks)",
            index.manifest().generation,
            index.len()
        );
        Ok(Some(index))
    }

    /// Replace the live index with `chunks` and their `embeddings`.
    ///
    /// Fails without touching the live generation when the inputs disagree.
    pub fn rebuild(
        &self,
        document: DocumentInfo,
        embedding_model: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> StoreResult<VectorIndex> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let dimension = embeddings.first().map_or(0, Vec::len);
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let _writer = self.writer.lock();
        let generations = self.root.join(GENERATIONS_DIR);
        fs::create_dir_all(&generations).map_err(|e| StoreError::io(&generations, e))?;

        let generation = self.next_generation()?;
        let name = generation_dir_name(generation);
        let manifest = IndexManifest::new(
            generation,
            document,
            embedding_model.to_string(),
            dimension,
            chunks.len(),
        );
        let vectors: Vec<f32> = embeddings.into_iter().flatten().collect();

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| StoreError::io(&self.root, e))?;
        persistence::write_generation(staging.path(), &manifest, &chunks, &vectors)?;

        let target = generations.join(&name);
        fs::rename(staging.path(), &target).map_err(|e| StoreError::io(&target, e))?;
        // The staging path no longer exists; dropping the guard is a no-op.
        drop(staging);

        persistence::write_current(&self.root, &name)?;
        crate::log_event!(
            "store",
            "swapped",
            "{name} ({} chunks, dimension {dimension})",
            chunks.len()
        );

        self.prune(&name);
        VectorIndex::from_parts(manifest, chunks, vectors)
    }

    fn next_generation(&self) -> StoreResult<u64> {
        let generations = self.root.join(GENERATIONS_DIR);
        let entries = match fs::read_dir(&generations) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(StoreError::io(&generations, e)),
        };

        let highest = entries
            .filter_map(Result::ok)
            .filter_map(|entry| parse_generation_dir_name(&entry.file_name().to_string_lossy()))
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    /// Best-effort removal of superseded generations and stale staging dirs.
    fn prune(&self, live: &str) {
        let generations = self.root.join(GENERATIONS_DIR);
        if let Ok(entries) = fs::read_dir(&generations) {
            for entry in entries.filter_map(Result::ok) {
                if entry.file_name().to_string_lossy() != live {
                    remove_quietly(&entry.path());
                }
            }
        }

        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.filter_map(Result::ok) {
                if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                    remove_quietly(&entry.path());
                }
            }
        }
    }
}

fn remove_quietly(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = result {
        tracing::warn!(target: "store", "could not remove {}: {e}", path.display());
    }
}

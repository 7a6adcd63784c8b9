//! On-disk format of one index generation.
//!
//! ```text
//! <root>/
//!   CURRENT                  name of the live generation
//!   generations/
//!     gen-000003/
//!       manifest.json
//!       chunks.json
//!       vectors.bin          little-endian f32, row-major
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::index::VectorIndex;
use super::{StoreError, StoreResult};
use crate::documents::{Chunk, DocumentInfo};
use crate::utils::get_utc_timestamp;

/// Version of the generation directory layout.
pub const FORMAT_VERSION: u32 = 1;

pub(crate) const CURRENT_FILE: &str = "CURRENT";
pub(crate) const GENERATIONS_DIR: &str = "generations";
pub(crate) const STAGING_PREFIX: &str = ".staging-";
const GENERATION_PREFIX: &str = "gen-";
const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Describes the document and embedding model behind a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,

    /// Monotonic generation number.
    pub generation: u64,

    pub document: DocumentInfo,

    /// Model that produced the vectors; queries must use the same one.
    pub embedding_model: String,

    /// Length of every vector (0 when the document had no text).
    pub dimension: usize,

    pub chunk_count: usize,
    pub page_count: usize,

    /// UTC seconds since the epoch.
    pub created_at: u64,
}

impl IndexManifest {
    pub fn new(
        generation: u64,
        document: DocumentInfo,
        embedding_model: String,
        dimension: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generation,
            page_count: document.page_count,
            document,
            embedding_model,
            dimension,
            chunk_count,
            created_at: get_utc_timestamp(),
        }
    }
}

/// Directory name for a generation number.
pub(crate) fn generation_dir_name(generation: u64) -> String {
    format!("{GENERATION_PREFIX}{generation:06}")
}

/// Parse a generation number back out of a directory name.
pub(crate) fn parse_generation_dir_name(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

/// Write all files of a generation into `dir`, which must already exist.
pub(crate) fn write_generation(
    dir: &Path,
    manifest: &IndexManifest,
    chunks: &[Chunk],
    vectors: &[f32],
) -> StoreResult<()> {
    write_json(&dir.join(CHUNKS_FILE), chunks)?;

    let vectors_path = dir.join(VECTORS_FILE);
    let file = File::create(&vectors_path).map_err(|e| StoreError::io(&vectors_path, e))?;
    let mut writer = BufWriter::new(file);
    for value in vectors {
        writer
            .write_all(&value.to_le_bytes())
            .map_err(|e| StoreError::io(&vectors_path, e))?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::io(&vectors_path, e.into_error()))?;
    file.sync_all().map_err(|e| StoreError::io(&vectors_path, e))?;

    // Manifest last: a generation without one is never loaded.
    write_json(&dir.join(MANIFEST_FILE), manifest)
}

/// Read the manifest of a generation directory.
pub(crate) fn read_manifest(dir: &Path) -> StoreResult<IndexManifest> {
    let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(StoreError::Corrupted {
            reason: format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            ),
        });
    }
    Ok(manifest)
}

/// Load a complete generation, validating it against its manifest.
pub(crate) fn read_generation(dir: &Path) -> StoreResult<VectorIndex> {
    let manifest = read_manifest(dir)?;
    let chunks: Vec<Chunk> = read_json(&dir.join(CHUNKS_FILE))?;
    let vectors = read_vectors(&dir.join(VECTORS_FILE))?;

    let expected = manifest.chunk_count * manifest.dimension;
    if vectors.len() != expected {
        return Err(StoreError::Corrupted {
            reason: format!(
                "{} holds {} values, manifest expects {expected}",
                VECTORS_FILE,
                vectors.len()
            ),
        });
    }

    VectorIndex::from_parts(manifest, chunks, vectors)
}

fn read_vectors(path: &Path) -> StoreResult<Vec<f32>> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    if len % 4 != 0 {
        return Err(StoreError::Corrupted {
            reason: format!("{} has {len} bytes, not a multiple of 4", path.display()),
        });
    }

    // SAFETY: generations are immutable once the pointer names them.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| StoreError::io(path, e))?;
    Ok(mmap
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Name of the live generation, if any.
pub(crate) fn read_current(root: &Path) -> StoreResult<Option<String>> {
    let path = root.join(CURRENT_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let name = contents.trim();
            if name.is_empty() {
                Ok(None)
            } else {
                Ok(Some(name.to_string()))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Atomically point `CURRENT` at `generation_name`.
pub(crate) fn write_current(root: &Path, generation_name: &str) -> StoreResult<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(root).map_err(|e| StoreError::io(root, e))?;
    tmp.write_all(generation_name.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;

    let target = root.join(CURRENT_FILE);
    tmp.persist(&target)
        .map_err(|e| StoreError::io(&target, e.error))?;
    Ok(())
}

/// Path of a generation directory under `root`.
pub(crate) fn generation_path(root: &Path, name: &str) -> PathBuf {
    root.join(GENERATIONS_DIR).join(name)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    file.write_all(&json)
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(chunk_count: usize, dimension: usize) -> IndexManifest {
        IndexManifest::new(
            7,
            DocumentInfo {
                file_name: "syllabus.pdf".to_string(),
                content_hash: "deadbeef".to_string(),
                page_count: 2,
            },
            "BAAI/bge-m3".to_string(),
            dimension,
            chunk_count,
        )
    }

    #[test]
    fn test_generation_names() {
        assert_eq!(generation_dir_name(3), "gen-000003");
        assert_eq!(parse_generation_dir_name("gen-000003"), Some(3));
        assert_eq!(parse_generation_dir_name(".staging-abc"), None);
        assert_eq!(parse_generation_dir_name("gen-x"), None);
    }

    #[test]
    fn test_write_then_read_generation() {
        let temp_dir = TempDir::new().unwrap();
        let chunks = vec![
            Chunk::new("first".to_string(), 0, 0, (0, 5)),
            Chunk::new("second".to_string(), 1, 1, (0, 6)),
        ];
        let vectors = vec![0.5, -1.25, 3.0, 0.0];

        write_generation(temp_dir.path(), &manifest(2, 2), &chunks, &vectors).unwrap();
        let index = read_generation(temp_dir.path()).unwrap();

        assert_eq!(index.manifest().generation, 7);
        assert_eq!(index.chunks(), &chunks[..]);
        assert_eq!(index.embedding(0), Some(&[0.5, -1.25][..]));
        assert_eq!(index.embedding(1), Some(&[3.0, 0.0][..]));
    }

    #[test]
    fn test_truncated_vectors_are_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let chunks = vec![Chunk::new("only".to_string(), 0, 0, (0, 4))];
        write_generation(temp_dir.path(), &manifest(1, 3), &chunks, &[1.0, 2.0, 3.0]).unwrap();

        let vectors_path = temp_dir.path().join(VECTORS_FILE);
        let bytes = fs::read(&vectors_path).unwrap();
        fs::write(&vectors_path, &bytes[..8]).unwrap();

        let err = read_generation(temp_dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[test]
    fn test_empty_generation_loads() {
        let temp_dir = TempDir::new().unwrap();
        write_generation(temp_dir.path(), &manifest(0, 0), &[], &[]).unwrap();

        let index = read_generation(temp_dir.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_current_pointer_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(read_current(temp_dir.path()).unwrap(), None);

        write_current(temp_dir.path(), "gen-000001").unwrap();
        write_current(temp_dir.path(), "gen-000002").unwrap();
        assert_eq!(
            read_current(temp_dir.path()).unwrap().as_deref(),
            Some("gen-000002")
        );
    }

    #[test]
    fn test_unknown_format_version_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut m = manifest(0, 0);
        m.format_version = 99;
        write_generation(temp_dir.path(), &m, &[], &[]).unwrap();

        assert!(matches!(
            read_manifest(temp_dir.path()),
            Err(StoreError::Corrupted { .. })
        ));
    }
}

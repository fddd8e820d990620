//! Index pipeline: load → chunk → embed → store, with reuse of a persisted index.
//!
//! A persisted index is a directory holding `store.json` and `manifest.json`. The
//! manifest is written with `complete = false` before embedding starts and rewritten
//! with `complete = true` only after the store is saved, so an interrupted build is
//! never mistaken for a usable index. An index with no entries, or one embedded with a
//! different model than the current one, is rebuilt rather than reused.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunks::{chunk_documents, Chunk, ChunkError};
use crate::config::{Config, ConfigError};
use crate::documents::{load_documents, load_documents_cached, LoadError};
use crate::llm::{Embedder, LlmError};
use crate::store::{StoreError, VectorStore};

const MANIFEST_FILE: &str = "manifest.json";
const STORE_FILE: &str = "store.json";
const FORMAT_VERSION: u32 = 1;

/// Where an index lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDestination {
    InMemory,
    Persistent(PathBuf),
}

/// Describes a persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// SHA-256 over the chunk sources and texts the index was built from.
    pub fingerprint: String,
    pub chunk_count: usize,
    pub dimension: Option<usize>,
    pub embed_model: String,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// A complete persisted index was loaded; nothing was embedded.
    /// `stale` is set when it was built from a different chunk set.
    Reused { stale: bool },
    /// Every chunk was embedded and inserted.
    Built,
}

#[derive(Debug)]
pub struct BuiltIndex {
    pub store: VectorStore,
    pub outcome: IndexOutcome,
}

/// Runs the full pipeline for `config`: load documents (through the snapshot when
/// enabled), chunk, then build or reuse the index. `rebuild` discards a persisted
/// index first.
pub async fn build_index(
    config: &Config,
    embedder: &dyn Embedder,
    rebuild: bool,
) -> Result<BuiltIndex, IndexError> {
    let docs_dir = config.docs_dir()?;
    let documents = match config.documents_snapshot() {
        Some(snapshot) => load_documents_cached(&docs_dir, &config.glob, &snapshot)?,
        None => load_documents(&docs_dir, &config.glob)?,
    };
    let chunks = chunk_documents(&documents, &config.chunking)?;
    let destination = config.index_destination()?;
    if rebuild {
        if let IndexDestination::Persistent(dir) = &destination {
            clear_index(dir)?;
        }
    }
    build_or_load(&destination, &chunks, embedder, config.index.batch_size).await
}

/// Reuses a complete persisted index at `destination` without embedding anything;
/// otherwise embeds `chunks` into a fresh store and persists it when the destination
/// is on disk.
pub async fn build_or_load(
    destination: &IndexDestination,
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<BuiltIndex, IndexError> {
    let dir = match destination {
        IndexDestination::InMemory => {
            let store = embed_chunks(chunks, embedder, batch_size).await?;
            return Ok(BuiltIndex {
                store,
                outcome: IndexOutcome::Built,
            });
        }
        IndexDestination::Persistent(dir) => dir,
    };

    let fingerprint = fingerprint(chunks);
    if let Some(manifest) = read_manifest(dir)? {
        let store_path = dir.join(STORE_FILE);
        if !manifest.complete || !store_path.is_file() {
            tracing::warn!("index at {} is incomplete, rebuilding", dir.display());
        } else if manifest.chunk_count == 0 {
            tracing::info!("index at {} has no entries, rebuilding", dir.display());
        } else if manifest.embed_model != embedder.model_name() {
            tracing::warn!(
                "index at {} was embedded with {}, not {}; rebuilding",
                dir.display(),
                manifest.embed_model,
                embedder.model_name()
            );
        } else {
            let store = VectorStore::load(&store_path)?;
            let stale = manifest.fingerprint != fingerprint;
            if stale {
                tracing::warn!(
                    "index at {} was built from different documents; reusing it anyway (rebuild to refresh)",
                    dir.display()
                );
            }
            tracing::info!("reusing index at {} ({} chunks)", dir.display(), store.len());
            return Ok(BuiltIndex {
                store,
                outcome: IndexOutcome::Reused { stale },
            });
        }
    }

    std::fs::create_dir_all(dir).map_err(|e| IndexError::Io(dir.clone(), e))?;
    let mut manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        fingerprint,
        chunk_count: chunks.len(),
        dimension: None,
        embed_model: embedder.model_name().to_string(),
        complete: false,
    };
    write_manifest(dir, &manifest)?;

    let store = embed_chunks(chunks, embedder, batch_size).await?;
    store.save(&dir.join(STORE_FILE))?;

    manifest.dimension = store.dimension();
    manifest.complete = true;
    write_manifest(dir, &manifest)?;
    tracing::info!("built index at {} ({} chunks)", dir.display(), store.len());
    Ok(BuiltIndex {
        store,
        outcome: IndexOutcome::Built,
    })
}

/// Embeds chunks in batches of `batch_size` and inserts them in order.
async fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<VectorStore, IndexError> {
    let mut store = VectorStore::new();
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(IndexError::EmbeddingCount {
                expected: batch.len(),
                got: embeddings.len(),
            });
        }
        store.add_batch(batch.to_vec(), embeddings)?;
        tracing::debug!("embedded {}/{} chunks", store.len(), chunks.len());
    }
    Ok(store)
}

/// Fingerprint of a chunk set: SHA-256 over each chunk's source and text.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.source.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Reads the manifest in `dir`. `None` if there is none or it can't be parsed.
pub fn read_manifest(dir: &Path) -> Result<Option<IndexManifest>, IndexError> {
    let path = dir.join(MANIFEST_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::Io(path, e)),
    };
    match serde_json::from_str(&raw) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(e) => {
            tracing::warn!("unreadable manifest {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

fn write_manifest(dir: &Path, manifest: &IndexManifest) -> Result<(), IndexError> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest).map_err(|e| IndexError::Manifest(path.clone(), e))?;
    std::fs::write(&path, json).map_err(|e| IndexError::Io(path, e))
}

/// Removes a persisted index so the next build starts fresh.
pub fn clear_index(dir: &Path) -> Result<(), IndexError> {
    for name in [MANIFEST_FILE, STORE_FILE] {
        let path = dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IndexError::Io(path, e)),
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("embedding error: {0}")]
    Embed(#[from] LlmError),
    #[error("embedding model returned {got} vector(s) for {expected} chunk(s)")]
    EmbeddingCount { expected: usize, got: usize },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to encode manifest {0}: {1}")]
    Manifest(PathBuf, serde_json::Error),
}

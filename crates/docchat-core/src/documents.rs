//! Document Loader: reads the fetched text files under a folder into memory.
//!
//! Optionally snapshots the loaded set to a JSON file so later runs can skip the scan.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// One loaded file: where it came from and its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: PathBuf,
    pub text: String,
}

/// Loads every file under `root` whose path relative to `root` matches `pattern`
/// (e.g. `**/*.txt`). Results are ordered by path. Unreadable files fail the load.
pub fn load_documents(root: &Path, pattern: &str) -> Result<Vec<Document>, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::NotADirectory(root.to_path_buf()));
    }
    let matcher = compile(pattern)?;
    let mut documents = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| LoadError::Walk(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !matcher.is_match(relative) {
            continue;
        }
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::Read(path.to_path_buf(), e))?;
        documents.push(Document {
            source: path.to_path_buf(),
            text,
        });
    }
    tracing::info!("loaded {} document(s) from {}", documents.len(), root.display());
    Ok(documents)
}

/// On-disk form of a cached load. Only valid for the folder and pattern it was made from.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    root: PathBuf,
    pattern: String,
    documents: Vec<Document>,
}

/// Like [load_documents], but reuses the snapshot at `snapshot` when it was taken of
/// the same `root` and `pattern`, and writes a new one after a fresh load otherwise.
pub fn load_documents_cached(
    root: &Path,
    pattern: &str,
    snapshot: &Path,
) -> Result<Vec<Document>, LoadError> {
    if let Some(cached) = read_snapshot(snapshot)? {
        if cached.root.as_path() == root && cached.pattern == pattern {
            tracing::info!(
                "reusing {} document(s) from snapshot {}",
                cached.documents.len(),
                snapshot.display()
            );
            return Ok(cached.documents);
        }
        tracing::info!("snapshot {} is for another folder or pattern, rescanning", snapshot.display());
    }
    let documents = load_documents(root, pattern)?;
    let cached = Snapshot {
        root: root.to_path_buf(),
        pattern: pattern.to_string(),
        documents,
    };
    let json = serde_json::to_string(&cached)
        .map_err(|e| LoadError::Snapshot(snapshot.to_path_buf(), e))?;
    std::fs::write(snapshot, json).map_err(|e| LoadError::Write(snapshot.to_path_buf(), e))?;
    Ok(cached.documents)
}

/// `None` when there is no snapshot or it can't be decoded.
fn read_snapshot(snapshot: &Path) -> Result<Option<Snapshot>, LoadError> {
    let raw = match std::fs::read_to_string(snapshot) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LoadError::Read(snapshot.to_path_buf(), e)),
    };
    match serde_json::from_str(&raw) {
        Ok(cached) => Ok(Some(cached)),
        Err(e) => {
            tracing::warn!("ignoring unreadable snapshot {}: {}", snapshot.display(), e);
            Ok(None)
        }
    }
}

/// Deletes the snapshot, if any, so the next cached load rescans the folder.
pub fn invalidate_snapshot(snapshot: &Path) -> Result<(), LoadError> {
    match std::fs::remove_file(snapshot) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LoadError::Write(snapshot.to_path_buf(), e)),
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, LoadError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| LoadError::Pattern(pattern.to_string(), e))
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("invalid file pattern {0:?}: {1}")]
    Pattern(String, globset::Error),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("write error for {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("failed to encode snapshot {0}: {1}")]
    Snapshot(PathBuf, serde_json::Error),
}

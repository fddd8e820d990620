//! Post-fetch layout passes: move every `.txt` file to the root of the docs folder
//! (sanitizing it on the way) and prune the directories that leaves empty.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::sanitize::sanitize;

/// Rewrites every `.txt` file under `root` (at any depth) into `root` itself with
/// sanitized content, deleting the original when it lived elsewhere.
/// Files sharing a base name overwrite each other; the last one visited wins.
/// Returns the number of files written.
pub fn flatten_dir(root: &Path) -> Result<usize, FlattenError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| FlattenError::Walk(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "txt") {
            files.push(path.to_path_buf());
        }
    }

    for old_path in &files {
        let Some(name) = old_path.file_name() else {
            continue;
        };
        let new_path = root.join(name);
        let content = std::fs::read_to_string(old_path)
            .map_err(|e| FlattenError::Read(old_path.clone(), e))?;
        std::fs::write(&new_path, sanitize(&content))
            .map_err(|e| FlattenError::Write(new_path.clone(), e))?;
        if *old_path != new_path {
            std::fs::remove_file(old_path).map_err(|e| FlattenError::Remove(old_path.clone(), e))?;
        }
    }
    tracing::debug!("flattened {} file(s) into {}", files.len(), root.display());
    Ok(files.len())
}

/// Removes every empty directory below `root`, deepest first, so a parent left empty
/// by removing its children goes too. `root` itself is kept. Returns the number removed.
pub fn remove_empty_dirs(root: &Path) -> Result<usize, FlattenError> {
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| FlattenError::Walk(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let is_empty = std::fs::read_dir(path)
            .map_err(|e| FlattenError::Read(path.to_path_buf(), e))?
            .next()
            .is_none();
        if is_empty {
            std::fs::remove_dir(path).map_err(|e| FlattenError::Remove(path.to_path_buf(), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("write error for {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("remove error for {0}: {1}")]
    Remove(PathBuf, std::io::Error),
}

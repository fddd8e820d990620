//! Where docchat stores its own data (config, fetched docs, index, caches).
//!
//! Every path can be overridden in the config file; these are the defaults.

use std::path::PathBuf;

/// Returns the directory where docchat stores config, docs, index and caches.
/// On Linux: `~/.local/share/docchat/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "docchat", "docchat")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default folder for fetched, flattened `.txt` documents.
pub fn default_docs_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("docs"))
}

/// Default location of the persisted vector index.
pub fn default_index_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("index"))
}

/// Default location of the loaded-documents snapshot.
pub fn default_documents_snapshot() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("documents.json"))
}

//! Persisted config (repositories to fetch, models, index location, server address)
//! in the app data directory, plus the secret files it points at.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::ChunkConfig;
use crate::github::RepoSource;
use crate::index::IndexDestination;

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder holding the flattened `.txt` documents. Defaults to `<app data>/docs`.
    pub docs_dir: Option<String>,
    /// Pattern (relative to `docs_dir`) selecting the files to load.
    pub glob: String,
    /// Snapshot loaded documents to `<app data>/documents.json` and reuse them.
    pub cache_documents: bool,
    pub github: GithubConfig,
    pub chunking: ChunkConfig,
    pub ollama: OllamaConfig,
    pub index: IndexConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_dir: None,
            glob: "**/*.txt".to_string(),
            cache_documents: true,
            github: GithubConfig::default(),
            chunking: ChunkConfig::default(),
            ollama: OllamaConfig::default(),
            index: IndexConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// File holding a GitHub access token. Requests are unauthenticated when unset.
    pub token_file: Option<String>,
    /// Deepest directory level the fetcher descends into (the start path is level 0).
    pub max_depth: usize,
    /// File suffixes worth downloading, without the leading dot.
    pub extensions: Vec<String>,
    pub repos: Vec<RepoSource>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_file: None,
            max_depth: 16,
            extensions: ["qmd", "md", "mdx", "rst", "txt", "py", "rs"]
                .into_iter()
                .map(String::from)
                .collect(),
            repos: vec![RepoSource {
                owner: "rstudio".to_string(),
                repo: "py-shiny-docs".to_string(),
                path: "docs".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: crate::ollama::DEFAULT_BASE_URL.to_string(),
            embed_model: crate::ollama::DEFAULT_EMBED_MODEL.to_string(),
            chat_model: crate::ollama::DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Keep the index on disk between runs. When false the index lives in memory only.
    pub persist: bool,
    /// Index directory. Defaults to `<app data>/index`.
    pub path: Option<String>,
    /// Chunks per embedding request.
    pub batch_size: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Rewrite follow-up questions into standalone ones before retrieval.
    pub condense_question: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
            batch_size: 32,
            top_k: 4,
            condense_question: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Seconds a chat session may sit idle before it is dropped.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7860".to_string(),
            session_ttl_secs: 3600,
        }
    }
}

impl Config {
    /// Folder for fetched documents.
    pub fn docs_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.docs_dir.as_deref().filter(|s| !s.is_empty()) {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => app_data::default_docs_dir().ok_or(ConfigError::NoDataDir),
        }
    }

    /// Where the vector index lives.
    pub fn index_destination(&self) -> Result<IndexDestination, ConfigError> {
        if !self.index.persist {
            return Ok(IndexDestination::InMemory);
        }
        let dir = match self.index.path.as_deref().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => app_data::default_index_dir().ok_or(ConfigError::NoDataDir)?,
        };
        Ok(IndexDestination::Persistent(dir))
    }

    /// Path of the documents snapshot, or `None` when snapshots are disabled.
    pub fn documents_snapshot(&self) -> Option<PathBuf> {
        if !self.cache_documents {
            return None;
        }
        app_data::default_documents_snapshot()
    }

    /// The config as pretty-printed TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reads the GitHub token if a token file is configured.
    pub fn github_token(&self) -> Result<Option<String>, ConfigError> {
        self.github
            .token_file
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|p| read_secret(Path::new(p)))
            .transpose()
    }
}

/// Path of the config file in the app data directory.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!("ignoring invalid config at {}: {}", path.display(), e);
        Config::default()
    })
}

/// Load config from an explicit path. Unlike [load_config], a missing or invalid file is an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&s).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Save config to the app data directory. Returns the path written.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to `path`.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, config.to_toml()?).map_err(ConfigError::Write)
}

/// Reads a key or token file as trimmed text.
pub fn read_secret(path: &Path) -> Result<String, ConfigError> {
    let raw =
        std::fs::read_to_string(path).map_err(|e| ConfigError::ReadSecret(path.to_path_buf(), e))?;
    Ok(raw.trim().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to read secret file {0}: {1}")]
    ReadSecret(PathBuf, std::io::Error),
}

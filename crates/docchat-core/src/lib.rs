//! All backend logic independent of how the app is run (CLI or web).
//!
//! Documentation is fetched from GitHub into a flat folder of `.txt` files, loaded,
//! chunked and embedded into a vector index, and then queried by a conversational
//! retrieval loop. docchat stores its own state in its app data directory (see [app_data]).

pub mod app_data;
pub mod chat;
pub mod chunks;
pub mod config;
pub mod documents;
pub mod flatten;
pub mod github;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod sanitize;
pub mod store;

#[cfg(test)]
mod test_util;

pub use app_data::app_data_dir;
pub use chat::{Answer, ChatError, ChatTurn, RetrievalChat, RetrievalOptions, Transcript};
pub use chunks::{chunk_document, chunk_documents, Chunk, ChunkConfig, ChunkError, SplitPolicy};
pub use config::{load_config, load_config_from, read_secret, save_config, Config, ConfigError};
pub use documents::{invalidate_snapshot, load_documents, load_documents_cached, Document, LoadError};
pub use flatten::{flatten_dir, remove_empty_dirs, FlattenError};
pub use github::{FetchError, FetchReport, GithubFetcher, RepoSource};
pub use index::{build_index, build_or_load, clear_index, BuiltIndex, IndexDestination, IndexError, IndexOutcome};
pub use llm::{ChatModel, Embedder, LlmError, Message, Role};
pub use ollama::{OllamaClient, OllamaError};
pub use sanitize::sanitize;
pub use store::{Hit, StoreError, VectorStore};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "docchat-core ready"
}

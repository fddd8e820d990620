//! Application state shared by all handlers.

use std::sync::Arc;
use std::time::Duration;

use docchat_core::RetrievalChat;

use crate::sessions::SessionStore;

/// Shared by every request: the retrieval chat (read-only index and models)
/// and the per-session transcripts.
pub struct AppState {
    pub chat: RetrievalChat,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(chat: RetrievalChat) -> Arc<Self> {
        Arc::new(Self {
            chat,
            sessions: SessionStore::new(),
        })
    }

    /// Like [AppState::new], evicting sessions idle for longer than `session_ttl`.
    pub fn with_session_ttl(chat: RetrievalChat, session_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            chat,
            sessions: SessionStore::with_ttl(session_ttl),
        })
    }
}

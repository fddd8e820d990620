//! Per-visitor chat sessions. Each session owns its own transcript.
//!
//! Sessions idle for longer than the store's TTL are dropped the next time a session
//! is created.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docchat_core::Transcript;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Default idle time after which a session is evicted.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Transcript handle for one session. Turns within a session run one at a time.
pub type SessionHandle = Arc<Mutex<Transcript>>;

#[derive(Debug)]
struct Session {
    transcript: SessionHandle,
    last_used: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Starts a session with a fresh, empty transcript, evicting idle sessions first.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_used.elapsed() < self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("evicted {} idle session(s)", evicted);
        }
        sessions.insert(
            id,
            Session {
                transcript: Arc::new(Mutex::new(Transcript::new())),
                last_used: Instant::now(),
            },
        );
        tracing::debug!("session {} started", id);
        id
    }

    /// Looks up a session and marks it as used.
    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.last_used = Instant::now();
        Some(session.transcript.clone())
    }

    /// Ends a session. Returns false if it didn't exist.
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

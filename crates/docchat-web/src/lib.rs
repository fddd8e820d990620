//! Web front end for docchat: a single chat page plus the JSON API it talks to.
//!
//! Every visitor gets their own session and transcript; the index and models are shared.

pub mod error;
pub mod handlers;
pub mod sessions;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use sessions::SessionStore;
pub use state::AppState;

/// Creates the application router: the chat page, health check and session API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index_page))
        .route("/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            post(handlers::post_message),
        )
        .route(
            "/api/sessions/:session_id/transcript",
            delete(handlers::clear_transcript),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the chat UI on an already-bound listener until the server stops.
pub async fn serve_on(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServeError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("chat UI listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .await
        .map_err(ServeError::Serve)
}

/// Binds `addr` and serves the chat UI.
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::Bind(addr.to_string(), e))?;
    serve_on(listener, state).await
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

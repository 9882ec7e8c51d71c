//! Streaming multipart upload endpoint for a content-addressed file
//! repository service.
//!
//! The receive pipeline runs, in dependency order: [`line_buffer`]
//! (CRLF line framing) → [`multipart`] (boundary/header parsing) →
//! [`tempsink`] (on-disk scratch file) → [`progress`] (cross-request
//! shared counters) → [`recv_fsm`] (the state machine tying the four
//! together) → [`lifecycle`] (per-request setup/teardown) →
//! [`handlers`] (the routes in [`router`]).

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod line_buffer;
pub mod multipart;
pub mod progress;
pub mod recv_fsm;
pub mod tempsink;
pub mod unique_name;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use backend::Backend;
use config::Config;

/// Shared application state handed to every handler behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn Backend>,
}

/// Builds the service's `axum::Router`.
///
/// Routes: `POST /upload/:token`, `POST /update/:token`,
/// `GET /upload_progress`, `GET /healthz`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload/{token}", post(handlers::upload))
        .route("/update/{token}", post(handlers::update))
        .route("/upload_progress", get(handlers::progress))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// `GET /healthz`: process liveness probe.
async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn router_builds_with_a_local_backend() {
        let backend: Arc<dyn Backend> = Arc::new(backend::LocalBackend::new(std::env::temp_dir(), HashMap::new()));
        let state = Arc::new(AppState { config: Config::default(), backend });
        let _router = router(state);
    }
}

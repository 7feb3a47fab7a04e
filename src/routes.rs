//! HTTP health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::conversation::SessionStore;

/// Shared state for the health route.
#[derive(Clone)]
pub struct HealthState {
    pub sessions: Arc<SessionStore>,
}

/// GET /health
///
/// Liveness plus the number of in-memory conversation sessions.
async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "active_sessions": state.sessions.len().await,
    }))
}

pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

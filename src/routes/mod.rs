pub mod comments;
pub mod likes;
pub mod posts;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Every API route, with tracing and permissive CORS for browser clients.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(posts::router())
        .merge(likes::router())
        .merge(comments::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

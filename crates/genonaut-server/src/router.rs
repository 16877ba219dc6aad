//! Router construction for the generation orchestrator server.

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the full axum router with all routes and shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/generation-jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::submit_job),
        )
        .route(
            "/generation-jobs/:id",
            get(handlers::jobs::get_job).delete(handlers::jobs::cancel_job),
        )
        .route(
            "/generation-jobs/:id/progress",
            get(handlers::jobs::progress_sse),
        )
        .route("/content", get(handlers::content::gallery))
        .route(
            "/content/stats/unified",
            get(handlers::content::unified_stats),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

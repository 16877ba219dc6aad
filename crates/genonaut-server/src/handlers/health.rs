//! Health check endpoint.
//!
//! - `GET /health` — liveness plus a DB connectivity probe.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => Json(json!({"status": "ok", "database": "ok"})),
        Err(e) => {
            tracing::error!(error = %e, "health check: database unreachable");
            Json(json!({"status": "degraded", "database": "unreachable"}))
        }
    }
}

//! HTTP-level integration tests for the gallery and job submission surface.
//!
//! Requires a running PostgreSQL database with `schema.sql` applied.
//! Run with: DATABASE_URL="postgresql:///genonaut_test" cargo test -p genonaut-server --test gallery_http_integration -- --ignored --nocapture

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use tower::ServiceExt;

use genonaut_backend::{GenerationBackend, MockBackend, PrimaryBackend};
use genonaut_core::config::Config;
use genonaut_core::types::BackendKind;
use genonaut_db::PgStores;
use genonaut_server::router::build_router;
use genonaut_server::state::AppState;
use genonaut_worker::ProgressHub;
use sqlx::postgres::PgPoolOptions;

async fn build_test_app() -> axum::Router {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");

    let config = Arc::new(Config::from_env());
    let stores = PgStores::new(pool.clone(), config.planner.clone());

    let mut backends: HashMap<BackendKind, Arc<dyn GenerationBackend>> = HashMap::new();
    backends.insert(
        BackendKind::Primary,
        Arc::new(PrimaryBackend::new(
            config.backend_primary.url.clone(),
            config.backend_primary.output_dir.clone(),
            config.submit_timeout,
        )) as Arc<dyn GenerationBackend>,
    );
    backends.insert(
        BackendKind::Mock,
        Arc::new(MockBackend::new(config.backend_mock.output_dir.clone())) as Arc<dyn GenerationBackend>,
    );

    let state = AppState {
        jobs: Arc::new(stores.jobs),
        job_queue: Arc::new(stores.job_queue),
        content: Arc::new(stores.content),
        tags: Arc::new(stores.tags),
        stats: Arc::new(stores.stats),
        progress: Arc::new(ProgressHub::new()),
        config,
        db_pool: pool,
    };
    build_router(state)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }))
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_health_reports_ok() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_submit_job_rejects_empty_prompt() {
    let app = build_test_app().await;
    let body = serde_json::json!({
        "user_id": uuid::Uuid::new_v4(),
        "prompt": "   ",
        "backend": "mock",
    });
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generation-jobs")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_submit_then_get_job_roundtrips() {
    let app = build_test_app().await;
    let user_id = uuid::Uuid::new_v4();
    let submit_body = serde_json::json!({
        "user_id": user_id,
        "prompt": "a cat wearing a hat",
        "width": 512,
        "height": 512,
        "backend": "mock",
    });
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generation-jobs")
                .header("content-type", "application/json")
                .body(Body::from(submit_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let submitted = body_json(resp).await;
    let job_id = submitted["job_id"].as_i64().unwrap();
    assert_eq!(submitted["state"], "pending");

    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!("/generation-jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let job = body_json(resp).await;
    assert_eq!(job["id"], job_id);
    assert_eq!(job["user_id"], user_id.to_string());
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_gallery_with_empty_sources_returns_empty_page_with_no_db_call() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/content?sources=")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_next"], false);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_gallery_rejects_limit_zero() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/content?limit=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_submit_job_rejects_unknown_field() {
    let app = build_test_app().await;
    let body = serde_json::json!({
        "user_id": uuid::Uuid::new_v4(),
        "prompt": "a cat wearing a hat",
        "backend": "mock",
        "bogus_field": "nope",
    });
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generation-jobs")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_unified_stats_shape() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!("/content/stats/unified?user_id={}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["user_regular_count"].is_number());
    assert!(body["community_regular_count"].is_number());
}

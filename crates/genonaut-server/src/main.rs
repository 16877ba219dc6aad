//! genonaut-server — standalone REST server + in-process worker/refresh
//! runner for the generation orchestrator.
//!
//! Reads config from environment (`genonaut_core::config::Config::from_env`);
//! see that module for the recognized `GENONAUT_*` variables.

use std::collections::HashMap;
use std::sync::Arc;

use genonaut_backend::{GenerationBackend, MockBackend, PrimaryBackend};
use genonaut_core::config::Config;
use genonaut_core::types::BackendKind;
use genonaut_db::PgStores;
use genonaut_server::router::build_router;
use genonaut_server::state::AppState;
use genonaut_worker::{JobRunner, ProgressHub, StatsRefreshRunner};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,genonaut_server=debug,genonaut_worker=debug".into()),
        )
        .init();

    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!("connected to database");

    let stores = PgStores::new(pool.clone(), config.planner.clone());
    let jobs = Arc::new(stores.jobs);
    let job_queue = Arc::new(stores.job_queue);
    let content = Arc::new(stores.content);
    let tags = Arc::new(stores.tags);
    let stats = Arc::new(stores.stats);
    let progress = Arc::new(ProgressHub::new());

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

    let runner = JobRunner::new(
        jobs.clone(),
        job_queue.clone(),
        content.clone(),
        tags.clone(),
        backends,
        config.clone(),
        progress.clone(),
    );
    tokio::spawn(async move {
        runner.run("genonaut-worker-0").await;
    });
    tracing::info!("job runner spawned");

    let refresh_runner = StatsRefreshRunner::new(stats.clone(), config.stats_refresh_interval);
    tokio::spawn(async move {
        refresh_runner.run().await;
    });
    tracing::info!(
        interval_secs = config.stats_refresh_interval.as_secs(),
        "stats refresh runner spawned"
    );

    let state = AppState {
        jobs,
        job_queue,
        content,
        tags,
        stats,
        progress,
        config: config.clone(),
        db_pool: pool,
    };
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {}: {e}", config.bind_addr));
    tracing::info!("genonaut-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}

//! Shared axum application state.

use std::sync::Arc;

use genonaut_core::config::Config;
use genonaut_core::ports::{ContentStore, JobQueue, JobStore, StatsStore, TagStore};
use genonaut_worker::ProgressHub;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub job_queue: Arc<dyn JobQueue>,
    pub content: Arc<dyn ContentStore>,
    pub tags: Arc<dyn TagStore>,
    pub stats: Arc<dyn StatsStore>,
    pub progress: Arc<ProgressHub>,
    pub config: Arc<Config>,
    pub db_pool: sqlx::PgPool,
}

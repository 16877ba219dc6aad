//! Scheduled statistics refresh runner (C9) — §4.9.
//!
//! Periodically recomputes `tag_cardinality_stats` and `gen_source_stats`
//! from the content tables. Same shape as the job worker's claim loop:
//! sleep, do the work, log, never let one failed cycle kill the loop.

use std::sync::Arc;
use std::time::Duration;

use genonaut_core::ports::StatsStore;

pub struct StatsRefreshRunner {
    stats: Arc<dyn StatsStore>,
    interval: Duration,
}

impl StatsRefreshRunner {
    pub fn new(stats: Arc<dyn StatsStore>, interval: Duration) -> Self {
        Self { stats, interval }
    }

    /// Runs forever. Spawn via `tokio::spawn`.
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "stats refresh runner started");
        loop {
            tokio::time::sleep(self.interval).await;
            self.run_once().await;
        }
    }

    /// One refresh cycle, exposed separately so callers (and the CLI's
    /// `refresh-tag-stats` / `refresh-gen-source-stats` subcommands) can
    /// trigger it on demand instead of waiting for the next tick.
    pub async fn run_once(&self) {
        match self.stats.refresh_tag_cardinality().await {
            Ok(rows) => tracing::info!(rows, "tag cardinality refreshed"),
            Err(e) => tracing::error!(error = %e, "tag cardinality refresh failed"),
        }
        match self.stats.refresh_gen_source_stats().await {
            Ok(rows) => tracing::info!(rows, "gen-source stats refreshed"),
            Err(e) => tracing::error!(error = %e, "gen-source stats refresh failed"),
        }
    }
}

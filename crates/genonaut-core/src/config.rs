//! Process-wide configuration, captured once at startup and injected via
//! `Arc` (§9 "Global singletons" design note — components never read
//! ambient globals on the hot path). Populated from environment variables
//! only; a layered config-file loader is out of scope (§1).

use std::time::Duration;

use crate::planner::PlannerConfig;

#[derive(Debug, Clone)]
pub struct BackendEndpoint {
    pub url: String,
    pub output_dir: std::path::PathBuf,
    pub models_dir: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,

    pub backend_primary: BackendEndpoint,
    pub backend_mock: BackendEndpoint,

    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub submit_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff_base: Duration,
    pub retry_backoff_factor: u32,

    pub pagination_max_page_size: u32,
    pub pagination_default_page_size: u32,

    pub default_checkpoint_model: String,

    pub planner: PlannerConfig,

    pub stats_refresh_interval: Duration,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from the process environment, the way
    /// `sem_os_server::main` reads its `SEM_OS_*` variables. Required
    /// variables without a sane default panic at startup with a clear
    /// message, matching the teacher's `expect(...)` style for fail-fast
    /// misconfiguration.
    pub fn from_env() -> Self {
        let database_url =
            env_var("GENONAUT_DATABASE_URL").expect("GENONAUT_DATABASE_URL must be set");
        let bind_addr = env_var("GENONAUT_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into());

        let primary_url = env_var("GENONAUT_BACKEND_PRIMARY_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8188".into());
        let mock_url =
            env_var("GENONAUT_BACKEND_MOCK_URL").unwrap_or_else(|| "http://127.0.0.1:8199".into());

        // §4.2: misconfiguration (same url for both backends) must be
        // detected and logged.
        if primary_url == mock_url {
            tracing::error!(
                primary_url = %primary_url,
                mock_url = %mock_url,
                "backend.primary.url and backend.mock.url are identical — \
                 url/output_dir co-selection (§9) will route both backends \
                 to the same endpoint"
            );
        }

        let backend_primary = BackendEndpoint {
            url: primary_url,
            output_dir: env_var("GENONAUT_BACKEND_PRIMARY_OUTPUT_DIR")
                .unwrap_or_else(|| "./var/primary/output".into())
                .into(),
            models_dir: env_var("GENONAUT_BACKEND_PRIMARY_MODELS_DIR")
                .unwrap_or_else(|| "./var/primary/models".into())
                .into(),
        };
        let backend_mock = BackendEndpoint {
            url: mock_url,
            output_dir: env_var("GENONAUT_BACKEND_MOCK_OUTPUT_DIR")
                .unwrap_or_else(|| "./var/mock/output".into())
                .into(),
            models_dir: env_var("GENONAUT_BACKEND_MOCK_MODELS_DIR")
                .unwrap_or_else(|| "./var/mock/models".into())
                .into(),
        };

        Self {
            database_url,
            bind_addr,
            backend_primary,
            backend_mock,
            poll_interval: Duration::from_secs(env_or("GENONAUT_POLL_INTERVAL_SECONDS", 2)),
            max_wait: Duration::from_secs(env_or("GENONAUT_MAX_WAIT_SECONDS", 900)),
            submit_timeout: Duration::from_secs(env_or("GENONAUT_SUBMIT_TIMEOUT_SECONDS", 30)),
            max_retries: env_or("GENONAUT_MAX_RETRIES", 3),
            retry_backoff_base: Duration::from_secs(env_or("GENONAUT_RETRY_BACKOFF_BASE", 5)),
            retry_backoff_factor: env_or("GENONAUT_RETRY_BACKOFF_FACTOR", 2),
            pagination_max_page_size: env_or("GENONAUT_PAGINATION_MAX_PAGE_SIZE", 200),
            pagination_default_page_size: env_or("GENONAUT_PAGINATION_DEFAULT_PAGE_SIZE", 25),
            default_checkpoint_model: env_var("GENONAUT_DEFAULT_CHECKPOINT_MODEL")
                .unwrap_or_else(|| "default.safetensors".into()),
            planner: PlannerConfig {
                small_k_threshold: env_or("GENONAUT_PLANNER_SMALL_K_THRESHOLD", 3),
                group_having_rarest_ceiling: env_or(
                    "GENONAUT_PLANNER_GROUP_HAVING_RAREST_CEILING",
                    50_000,
                ),
                two_phase_dual_seed_floor: env_or(
                    "GENONAUT_PLANNER_TWO_PHASE_DUAL_SEED_FLOOR",
                    150_000,
                ),
                two_phase_min_k_for_dual_seed: env_or(
                    "GENONAUT_PLANNER_TWO_PHASE_MIN_K_FOR_DUAL_SEED",
                    7,
                ),
                seed_candidate_cap: env_or("GENONAUT_PLANNER_SEED_CANDIDATE_CAP", 50_000),
                fallback_default_count: env_or(
                    "GENONAUT_PLANNER_FALLBACK_DEFAULT_COUNT",
                    1_000_000,
                ),
            },
            stats_refresh_interval: Duration::from_secs(env_or(
                "GENONAUT_STATS_REFRESH_INTERVAL_SECONDS",
                3600,
            )),
        }
    }

    pub fn backend_endpoint(&self, kind: crate::types::BackendKind) -> &BackendEndpoint {
        match kind {
            crate::types::BackendKind::Primary => &self.backend_primary,
            crate::types::BackendKind::Mock => &self.backend_mock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_endpoint_selects_matching_kind() {
        let cfg = Config {
            database_url: "postgres://x".into(),
            bind_addr: "0.0.0.0:8080".into(),
            backend_primary: BackendEndpoint {
                url: "http://primary".into(),
                output_dir: "/p".into(),
                models_dir: "/pm".into(),
            },
            backend_mock: BackendEndpoint {
                url: "http://mock".into(),
                output_dir: "/m".into(),
                models_dir: "/mm".into(),
            },
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(900),
            submit_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(5),
            retry_backoff_factor: 2,
            pagination_max_page_size: 200,
            pagination_default_page_size: 25,
            default_checkpoint_model: "default.safetensors".into(),
            planner: PlannerConfig::default(),
            stats_refresh_interval: Duration::from_secs(3600),
        };
        assert_eq!(
            cfg.backend_endpoint(crate::types::BackendKind::Primary).url,
            "http://primary"
        );
        assert_eq!(
            cfg.backend_endpoint(crate::types::BackendKind::Mock).url,
            "http://mock"
        );
    }
}

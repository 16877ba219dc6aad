//! Generation job worker: claims jobs off the durable queue, drives them
//! through a backend, materializes outputs, and publishes progress. Also
//! hosts the scheduled statistics refresh runner (C9).

pub mod job_runner;
pub mod materializer;
pub mod progress;
pub mod stats_refresh;

pub use job_runner::JobRunner;
pub use progress::ProgressHub;
pub use stats_refresh::StatsRefreshRunner;

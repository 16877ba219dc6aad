//! genonaut-server — standalone REST server for the generation orchestrator.
//!
//! Routes:
//!   GET    /health                             — liveness + DB check
//!   POST   /generation-jobs                     — submit a job
//!   GET    /generation-jobs/{id}                 — job state record
//!   DELETE /generation-jobs/{id}                 — request cancellation
//!   GET    /generation-jobs/{id}/progress        — SSE progress stream
//!   GET    /generation-jobs                      — list a user's own jobs
//!   GET    /content                              — gallery page
//!   GET    /content/stats/unified                — aggregate stats

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

//! Command-line tooling for the generation orchestrator (§6).
//!
//! Subcommands: `refresh-tag-stats`, `refresh-gen-source-stats`,
//! `submit-job --file`, `cancel-job --id`. Exit codes: 0 success, 2 bad
//! input, 1 runtime failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use genonaut_core::config::Config;
use genonaut_core::error::GenonautError;
use genonaut_core::submit::validate_and_normalize;
use genonaut_core::types::JobSpec;
use genonaut_db::PgStores;

#[derive(Parser)]
#[command(name = "genonaut", about = "Generation orchestrator CLI")]
struct Cli {
    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute `tag_cardinality_stats` from the content tables (C9).
    RefreshTagStats,
    /// Recompute `gen_source_stats` from the content tables (C9).
    RefreshGenSourceStats,
    /// Submit a job from a JSON file shaped like the `POST /generation-jobs` body.
    SubmitJob {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        user_id: Uuid,
    },
    /// Request cancellation of an in-flight job.
    CancelJob {
        #[arg(long)]
        id: i64,
    },
}

/// Exit code classification for the §6 contract.
enum Outcome {
    Success(serde_json::Value),
    BadInput(String),
    RuntimeFailure(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let outcome = run(cli.command).await;

    match outcome {
        Outcome::Success(value) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&value).unwrap());
            } else {
                println!("ok: {value}");
            }
            ExitCode::from(0)
        }
        Outcome::BadInput(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(2)
        }
        Outcome::RuntimeFailure(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(1)
        }
    }
}

async fn run(command: Command) -> Outcome {
    let config = Config::from_env();
    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => return Outcome::RuntimeFailure(format!("database connection failed: {e}")),
    };
    let stores = PgStores::new(pool, config.planner.clone());

    match command {
        Command::RefreshTagStats => match stores.stats.refresh_tag_cardinality().await {
            Ok(rows) => Outcome::Success(serde_json::json!({ "rows_updated": rows })),
            Err(e) => classify(e),
        },
        Command::RefreshGenSourceStats => match stores.stats.refresh_gen_source_stats().await {
            Ok(rows) => Outcome::Success(serde_json::json!({ "rows_updated": rows })),
            Err(e) => classify(e),
        },
        Command::SubmitJob { file, user_id } => {
            let raw = match std::fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(e) => return Outcome::BadInput(format!("cannot read {}: {e}", file.display())),
            };
            let spec: JobSpec = match serde_json::from_str(&raw) {
                Ok(spec) => spec,
                Err(e) => return Outcome::BadInput(format!("invalid job spec JSON: {e}")),
            };
            let normalized = match validate_and_normalize(spec, &config.default_checkpoint_model) {
                Ok(n) => n,
                Err(e) => return Outcome::BadInput(e.to_string()),
            };
            match stores.jobs.create(user_id, normalized).await {
                Ok(job) => match stores.job_queue.enqueue(job.id).await {
                    Ok(()) => Outcome::Success(serde_json::json!({
                        "job_id": job.id,
                        "state": job.state.as_str(),
                    })),
                    Err(e) => classify(e),
                },
                Err(e) => classify(e),
            }
        }
        Command::CancelJob { id } => match stores.jobs.request_cancel(id).await {
            Ok(job) => Outcome::Success(serde_json::json!({ "state": job.state.as_str() })),
            Err(e) => classify(e),
        },
    }
}

/// `Validation`/`NotFound`/`BadCursor` are caller mistakes (exit 2);
/// everything else — including `BackendUnavailable` after retries are
/// exhausted upstream — is a runtime failure (exit 1), per §6.
fn classify(e: GenonautError) -> Outcome {
    match e {
        GenonautError::Validation(_) | GenonautError::NotFound(_) | GenonautError::BadCursor(_) => {
            Outcome::BadInput(e.to_string())
        }
        other => Outcome::RuntimeFailure(other.to_string()),
    }
}

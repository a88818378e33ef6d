// replay.rs: Replay a recorded trace and print the result record.
//
// Anything that stops the session from being set up (unreadable config,
// bad trace, audit log that cannot be opened) still produces a record,
// with returnCode RT, so the job runner always gets an answer.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tg_audit::DecisionLog;
use tg_policy::{OutcomeCode, SessionConfig};
use tg_session::{read_events, replay, ResultRecord};

#[derive(Args)]
pub struct ReplayArgs {
    /// Session config (.toml, or JSON for any other extension).
    #[arg(long)]
    config: PathBuf,
    /// Recorded trace, one JSON event per line.
    #[arg(long)]
    events: PathBuf,
    /// Working directory of the traced program; made writable along with
    /// the scratch root.
    #[arg(long)]
    workdir: Option<PathBuf>,
    /// Append every decision to this hash-chained log.
    #[arg(long)]
    audit_log: Option<PathBuf>,
    /// File holding the program's captured standard output.
    #[arg(long)]
    output: Option<PathBuf>,
    /// File holding the program's captured standard error.
    #[arg(long)]
    stderr: Option<PathBuf>,
    /// Outcome reported by the tracer or resource layer (e.g. TL), used
    /// instead of the engine's own.
    #[arg(long)]
    outcome: Option<OutcomeCode>,
}

pub fn execute(args: &ReplayArgs) -> anyhow::Result<()> {
    let record = match run(args) {
        Ok(record) => record,
        Err(e) => ResultRecord::setup_failure(&format!("{:#}", e)),
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run(args: &ReplayArgs) -> anyhow::Result<ResultRecord> {
    let mut config = SessionConfig::load(&args.config)
        .with_context(|| format!("loading session config {}", args.config.display()))?;
    if let Some(workdir) = &args.workdir {
        config = config
            .with_writable([workdir.to_string_lossy().into_owned()])
            .with_writable_scratch();
    }

    let events = read_events(&args.events)?;
    let audit = match &args.audit_log {
        Some(path) => Some(DecisionLog::open(path)?),
        None => None,
    };

    let summary = replay(&config, &events, audit)?;
    tracing::info!(
        "session {}: {} events decided, {} dropped, outcome {}",
        summary.session_id,
        summary.events_decided,
        summary.events_dropped,
        summary.report.outcome_code
    );
    if summary.audit_failures > 0 {
        tracing::warn!(
            "session {}: {} decision(s) missing from the audit log",
            summary.session_id,
            summary.audit_failures
        );
    }

    let mut report = summary.report;
    if let Some(outcome) = args.outcome {
        report.outcome_code = outcome;
    }

    let output = read_captured(args.output.as_deref())?;
    let stderr = read_captured(args.stderr.as_deref())?;
    Ok(ResultRecord::assemble(&report, output, stderr))
}

/// Captured stream contents; a stream that was not captured is empty.
fn read_captured(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading captured stream {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => Ok(String::new()),
    }
}

// audit.rs: Decision log subcommands: verify, tail.
//
// `verify` checks the chain and prints one line per session: how many
// syscalls were decided and how the session ended. `tail` shows recent
// decisions, optionally for one session or only the kills.

use std::path::PathBuf;

use clap::Subcommand;
use tg_audit::{ChainReport, DecisionLog, DecisionRecord};
use tg_policy::PolicyDecision;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Check the hash chain and per-session ordering, then summarize each session.
    Verify {
        #[arg(long)]
        log: PathBuf,
    },
    /// Show the most recent decisions.
    Tail {
        #[arg(long)]
        log: PathBuf,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Only this session (full id or leading characters).
        #[arg(long)]
        session: Option<String>,
        /// Only decisions that killed the process.
        #[arg(long)]
        kills: bool,
    },
}

pub fn execute(cmd: &AuditCommands) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let report = match DecisionLog::verify_chain(log) {
                Ok(report) => report,
                Err(e) if e.is_tampering() => {
                    println!("{} has been altered: {}", log.display(), e);
                    anyhow::bail!("decision log failed verification");
                }
                Err(e) => return Err(e.into()),
            };
            for line in session_lines(&report) {
                println!("{}", line);
            }
        }

        AuditCommands::Tail {
            log,
            n,
            session,
            kills,
        } => {
            let records = DecisionLog::read_all(log)?;
            let recent = select(&records, session.as_deref(), *kills, *n);
            if recent.is_empty() {
                println!("No matching decisions.");
                return Ok(());
            }

            println!(
                "{:<20} {:<8} {:>5} {:<7} {:<16} {:<10} DENIAL",
                "TIMESTAMP", "SESSION", "SEQ", "EVENT", "SYSCALL", "DECISION"
            );
            for record in recent {
                let syscall = match &record.syscall_name {
                    Some(name) => format!("{}({})", name, record.syscall),
                    None => format!("#{}", record.syscall),
                };
                println!(
                    "{:<20} {:<8} {:>5} {:<7} {:<16} {:<10} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    short_id(record),
                    record.sequence,
                    record.event_kind.to_string(),
                    syscall,
                    decision_label(&record.decision),
                    record.denial_message.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}

/// A header line, then one line per session in id order.
fn session_lines(report: &ChainReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} record(s) from {} session(s), chain intact",
        report.records,
        report.sessions.len()
    )];
    for (id, trail) in &report.sessions {
        let mut line = format!("{}  {:>5} decided  {}", id, trail.decisions, trail.outcome());
        if let Some(message) = &trail.denial_message {
            line.push_str("  ");
            line.push_str(message);
        }
        lines.push(line);
    }
    lines
}

/// The last `n` records passing both filters, in log order.
fn select<'a>(
    records: &'a [DecisionRecord],
    session: Option<&str>,
    kills_only: bool,
    n: usize,
) -> Vec<&'a DecisionRecord> {
    let matching: Vec<&DecisionRecord> = records
        .iter()
        .filter(|r| session.map_or(true, |s| r.session_id.to_string().starts_with(s)))
        .filter(|r| !kills_only || r.decision.is_kill())
        .collect();
    let start = matching.len().saturating_sub(n);
    matching[start..].to_vec()
}

fn short_id(record: &DecisionRecord) -> String {
    record.session_id.to_string().chars().take(8).collect()
}

fn decision_label(decision: &PolicyDecision) -> String {
    match decision {
        PolicyDecision::Continue => "continue".to_string(),
        PolicyDecision::Kill { reason } => format!("kill {}", reason),
        PolicyDecision::Finish { result, .. } => format!("finish {}", result),
    }
}

//! # tracegate
//!
//! Command-line front end for the tracegate policy engine:
//! - `tracegate replay` runs a recorded syscall trace and prints the result record
//! - `tracegate check-open` asks the path rules about a single open
//! - `tracegate whitelist` lists an architecture's always-safe syscalls
//! - `tracegate audit verify/tail` inspects a decision log
//!
//! Logs go to stderr; stdout carries only command output.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Syscall policy engine for traced sandboxes.
#[derive(Parser)]
#[command(name = "tracegate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded trace and print the result record as JSON.
    Replay(commands::replay::ReplayArgs),
    /// Decide a single open() against a session config.
    CheckOpen(commands::check_open::CheckOpenArgs),
    /// List the always-safe syscalls of an architecture.
    Whitelist(commands::whitelist::WhitelistArgs),
    /// Inspect a decision log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tg_policy=info".parse()?)
                .add_directive("tg_session=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Replay(args) => commands::replay::execute(args),
        Commands::CheckOpen(args) => commands::check_open::execute(args),
        Commands::Whitelist(args) => commands::whitelist::execute(args),
        Commands::Audit { command } => commands::audit::execute(command),
    }
}

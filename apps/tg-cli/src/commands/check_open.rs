// check_open.rs: Decide a single open() against a session config.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tg_policy::{PolicyDecision, SessionConfig, SessionState};

#[derive(Args)]
pub struct CheckOpenArgs {
    /// Session config (.toml, or JSON for any other extension).
    #[arg(long)]
    config: PathBuf,
    /// Path as the program would pass it to open().
    path: String,
    /// open() flags, as an integer (0 = O_RDONLY).
    #[arg(long, default_value_t = 0)]
    mode: u64,
}

pub fn execute(args: &CheckOpenArgs) -> anyhow::Result<()> {
    let config = SessionConfig::load(&args.config)
        .with_context(|| format!("loading session config {}", args.config.display()))?;
    let (decision, message) = check(&config, &args.path, args.mode)?;
    match message {
        Some(message) => println!("deny: {}", message),
        None => println!("allow"),
    }
    tracing::debug!("check-open decision: {:?}", decision);
    Ok(())
}

fn check(
    config: &SessionConfig,
    path: &str,
    mode: u64,
) -> anyhow::Result<(PolicyDecision, Option<String>)> {
    let authorizer = config.path_authorizer();
    let mut state = SessionState::new();
    let decision = authorizer.authorize_open(path.as_bytes(), mode, &mut state)?;
    Ok((decision, state.last_denial().map(str::to_string)))
}

// error.rs: Error types for session driving and trace replay.

use std::path::PathBuf;
use thiserror::Error;

use tg_audit::AuditError;
use tg_policy::ConfigError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be set up from its configuration.
    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),

    /// A decision could not be written to the audit log.
    #[error("decision log failure: {0}")]
    Audit(#[from] AuditError),

    /// The recorded trace could not be read.
    #[error("failed to read trace {path}: {source}")]
    TraceReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A line of the recorded trace is not a valid event.
    #[error("invalid event on trace line {line}: {source}")]
    InvalidEvent {
        line: usize,
        source: serde_json::Error,
    },
}

// error.rs: Error types for the decision log.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while writing or checking a decision log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the log file.
    #[error("failed to open decision log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a record.
    #[error("failed to append record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A record could not be serialized, or a line is not a valid record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The hash chain is broken at this line.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// A session's events are not numbered 0, 1, 2, ... in log order.
    #[error("session {session_id} skips from sequence {expected} to {actual} at line {line}")]
    SequenceGap {
        line: usize,
        session_id: Uuid,
        expected: u64,
        actual: u64,
    },

    /// A session has a decision logged after its Kill or Finish.
    #[error("session {session_id} has a decision after its terminal one at line {line}")]
    RecordAfterTerminal { line: usize, session_id: Uuid },
}

impl AuditError {
    /// True for errors that mean the log content was altered or forged,
    /// as opposed to I/O or parse failures.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            AuditError::IntegrityViolation { .. }
                | AuditError::SequenceGap { .. }
                | AuditError::RecordAfterTerminal { .. }
        )
    }
}

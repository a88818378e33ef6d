// error.rs: Error types for the policy subsystem.
//
// Handlers return these instead of panicking. The dispatcher converts any
// of them into a Kill(RF) decision so the tracer always gets an answer.

use std::path::PathBuf;
use thiserror::Error;

use crate::arch::Architecture;

/// Errors raised while evaluating a single syscall event.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The tracee's memory at the argument address could not be read.
    #[error("unable to read tracee memory at {addr:#x}: {reason}")]
    MemoryUnreadable { addr: u64, reason: String },

    /// A path argument was not valid UTF-8.
    #[error("path argument is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The syscall number lies outside the range covered by the table.
    #[error("syscall number {number} is outside the syscall table")]
    NumberOutOfRange { number: u64 },

    /// The engine has no profile for this machine. Only raised at startup.
    #[error("unsupported architecture '{0}'")]
    UnsupportedArchitecture(String),
}

/// Errors raised while loading or validating a session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read session config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file was read but is not valid TOML.
    #[error("invalid TOML in session config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file was read but is not valid JSON.
    #[error("invalid JSON in session config: {0}")]
    Json(#[from] serde_json::Error),

    /// A path prefix rule is not absolute.
    #[error("path prefix '{prefix}' must be absolute")]
    RelativePrefix { prefix: String },

    /// The config names one architecture, the supplied profile another.
    #[error("config asks for {configured} but the syscall profile is {profile}")]
    ArchitectureMismatch {
        configured: Architecture,
        profile: Architecture,
    },

    /// The configuration names an architecture or syscall the engine
    /// cannot handle.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

//! # tg-policy
//!
//! Syscall authorization engine for traced sandbox sessions.
//!
//! A tracer (ptrace-style supervisor) intercepts every system call of an
//! untrusted program and asks the [`PolicyDispatcher`] what to do. The
//! dispatcher answers with a [`PolicyDecision`]: continue, kill with a
//! reason, or finish the session with the program's exit status.
//!
//! ## Key invariants
//!
//! - **Default deny**: a syscall not in the architecture's whitelist is killed.
//! - **Compat mode blocked**: 32-bit calls from a 64-bit process are always killed.
//! - **Path traversal blocked**: an `open` path whose `..` cannot be collapsed
//!   is always denied, whatever the prefix rules say.
//! - **Deletion confined**: `unlink` only works below the scratch root.
//! - **Always answers**: handler faults become Kill(RF), never a panic.
//! - **Finish is final**: after `exit_group` the session never runs again.
//!
//! ## Quick Example
//!
//! ```rust
//! use tg_policy::{Architecture, EventKind, NoMemory, PolicyDecision, PolicyDispatcher,
//!     SessionConfig, SyscallEvent};
//!
//! let config = SessionConfig::for_workdir("/tmp/run_1/")
//!     .with_readable(["/lib/", "/usr/lib/"])
//!     .with_architecture(Architecture::X86_64);
//! let mut dispatcher = PolicyDispatcher::new(&config).unwrap();
//!
//! // write(2) is on the whitelist.
//! let event = SyscallEvent::new(EventKind::Call, 1, [0, 1, 0], &NoMemory);
//! assert_eq!(dispatcher.decide(&event), PolicyDecision::Continue);
//!
//! // execve(2) is not.
//! let event = SyscallEvent::new(EventKind::Call, 59, [0, 0, 0], &NoMemory);
//! assert!(dispatcher.decide(&event).is_kill());
//! ```

pub mod arch;
pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod path;
pub mod state;
pub mod termination;
pub mod unlink;
pub mod whitelist;

pub use arch::{ArchProfile, Architecture, I686Profile, SyscallCategory, X86_64Profile};
pub use config::SessionConfig;
pub use decision::{Disposition, ExitDetails, OutcomeCode, PolicyDecision, TracerAction};
pub use dispatcher::{PolicyDispatcher, SessionPhase};
pub use error::{ConfigError, PolicyError};
pub use event::{EventKind, NoMemory, SyscallEvent, TraceeMemory};
pub use path::{collapse_dot_dots, PathAuthorizer, PathRule};
pub use state::{SessionReport, SessionState};
pub use termination::capture_exit;
pub use unlink::{UnlinkAuthorizer, DEFAULT_SCRATCH_ROOT};
pub use whitelist::SyscallWhitelist;

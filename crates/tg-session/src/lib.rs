//! # tg-session
//!
//! Drives traced sessions through the [`tg_policy`] engine and turns their
//! outcome into the result record the job runner consumes.
//!
//! - [`SessionRunner`]: one per traced process. Numbers events, audits
//!   decisions, and stops deciding after the first Kill or Finish.
//! - [`replay`]: runs a recorded JSONL trace through a fresh session.
//! - [`ResultRecord`]: `{returnCode, output, stderr, details}`, with the
//!   denial message appended to stderr on RF.

pub mod error;
pub mod replay;
pub mod result;
pub mod runner;

pub use error::SessionError;
pub use replay::{parse_events, read_events, replay, RecordedEvent, ReplayMemory, ReplaySummary};
pub use result::ResultRecord;
pub use runner::SessionRunner;

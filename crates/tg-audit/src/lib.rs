//! # tg-audit
//!
//! Append-only record of the policy decisions made during traced sessions.
//!
//! Every decision can be written as a [`DecisionRecord`] to a JSONL (JSON
//! Lines) file. Each line carries the SHA-256 of the line before it, so a
//! deleted, inserted or edited record breaks the chain and is caught by
//! [`DecisionLog::verify_chain`].
//!
//! Verification also replays the engine's per-session rules: every session's
//! sequence numbers run 0, 1, 2, ... and nothing follows its Kill or Finish.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tg_audit::{DecisionLog, DecisionRecord};
//! use tg_policy::{EventKind, PolicyDecision};
//! use uuid::Uuid;
//!
//! let mut log = DecisionLog::open("/tmp/decisions.jsonl").unwrap();
//! let mut record = DecisionRecord::new(Uuid::new_v4(), 0, EventKind::Call, 59, PolicyDecision::kill_rf())
//!     .with_denial("ILLEGAL SYSTEM CALL (#59)");
//! log.append(&mut record).unwrap();
//! ```

pub mod error;
pub mod hasher;
pub mod log;
pub mod record;

pub use error::AuditError;
pub use log::{ChainReport, DecisionLog, SessionTrail};
pub use record::DecisionRecord;

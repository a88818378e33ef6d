// record.rs: One line of the decision log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tg_policy::{EventKind, PolicyDecision};
use uuid::Uuid;

/// A single policy decision, as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique identifier for this record.
    pub record_id: Uuid,

    /// When the decision was made (UTC).
    pub timestamp: DateTime<Utc>,

    /// The traced session this decision belongs to.
    pub session_id: Uuid,

    /// Position of the event within its session, starting at 0.
    pub sequence: u64,

    /// Syscall entry, exit, or other tracer event.
    pub event_kind: EventKind,

    /// Syscall number as delivered by the tracer.
    pub syscall: u64,

    /// Syscall name, when the architecture profile knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syscall_name: Option<String>,

    /// What the engine answered.
    pub decision: PolicyDecision,

    /// The denial message recorded with a Kill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_message: Option<String>,

    /// Hash of the previous line in the log. None for the first record.
    pub previous_hash: Option<String>,
}

impl DecisionRecord {
    pub fn new(
        session_id: Uuid,
        sequence: u64,
        event_kind: EventKind,
        syscall: u64,
        decision: PolicyDecision,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id,
            sequence,
            event_kind,
            syscall,
            syscall_name: None,
            decision,
            denial_message: None,
            previous_hash: None,
        }
    }

    pub fn with_syscall_name(mut self, name: impl Into<String>) -> Self {
        self.syscall_name = Some(name.into());
        self
    }

    pub fn with_denial(mut self, message: impl Into<String>) -> Self {
        self.denial_message = Some(message.into());
        self
    }
}

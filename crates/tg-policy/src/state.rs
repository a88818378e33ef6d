// state.rs: Mutable per-session state and the end-of-session report.

use serde::{Deserialize, Serialize};

use crate::decision::{ExitDetails, OutcomeCode};

/// State owned by one dispatcher for one traced process.
///
/// Handlers write to it; the outer result-assembly code reads it once,
/// through [`SessionState::report`], when the session ends.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    last_denial: Option<String>,
    details: ExitDetails,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the denial message. Called on every Kill.
    pub fn record_denial(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("policy denial: {}", message);
        self.last_denial = Some(message);
    }

    /// Drop the denial message. Called on every decision that is not a Kill.
    pub fn clear_denial(&mut self) {
        self.last_denial = None;
    }

    pub fn record_exit_code(&mut self, code: i32) {
        self.details.exit_code = Some(code);
    }

    pub fn last_denial(&self) -> Option<&str> {
        self.last_denial.as_deref()
    }

    pub fn details(&self) -> &ExitDetails {
        &self.details
    }

    /// Build the report handed to the result-assembly layer.
    ///
    /// `outcome` is the final result the tracer reports for the session,
    /// which may come from the resource layer (TL, ML, ...) rather than
    /// from this engine.
    pub fn report(&self, outcome: OutcomeCode) -> SessionReport {
        SessionReport {
            outcome_code: outcome,
            details: self.details.clone(),
            denial_message: self.last_denial.clone(),
        }
    }
}

/// Everything the engine contributes to the session's result record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome_code: OutcomeCode,
    pub details: ExitDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_message: Option<String>,
}

impl SessionReport {
    /// The denial message, only when the outcome is RF.
    ///
    /// This is what gets appended to the traced program's stderr.
    pub fn stderr_suffix(&self) -> Option<&str> {
        match self.outcome_code {
            OutcomeCode::Rf => self.denial_message.as_deref(),
            _ => None,
        }
    }
}

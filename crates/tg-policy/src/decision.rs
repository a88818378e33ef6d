// decision.rs: What the engine answers for each event.
//
// A PolicyDecision is the only thing the tracer consumes from the engine.
// It is converted into a TracerAction (disposition + result code) before
// the tracer resumes or kills the traced process.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Session-result classification.
///
/// The engine itself only produces `Ok`, `Rf` and `At`. The rest come from
/// the tracer or the resource-limit layer and pass through unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OutcomeCode {
    /// Program exited with status zero.
    #[serde(rename = "OK")]
    Ok,
    /// Restricted function: illegal syscall, file access or deletion.
    #[serde(rename = "RF")]
    Rf,
    /// Runtime fault outside the traced session (setup, bad config).
    #[serde(rename = "RT")]
    Rt,
    /// Time limit exceeded.
    #[serde(rename = "TL")]
    Tl,
    /// Memory limit exceeded.
    #[serde(rename = "ML")]
    Ml,
    /// Output limit exceeded.
    #[serde(rename = "OL")]
    Ol,
    /// Abnormal termination (non-zero exit).
    #[serde(rename = "AT")]
    At,
    /// Internal error of the tracer.
    #[serde(rename = "IE")]
    Ie,
    /// Breakpoint or signal.
    #[serde(rename = "BP")]
    Bp,
    /// Pending: the session has not finished.
    #[serde(rename = "PD")]
    Pd,
    /// Unrecognized result.
    #[serde(rename = "NA")]
    Na,
}

impl OutcomeCode {
    pub const ALL: [OutcomeCode; 11] = [
        OutcomeCode::Ok,
        OutcomeCode::Rf,
        OutcomeCode::Rt,
        OutcomeCode::Tl,
        OutcomeCode::Ml,
        OutcomeCode::Ol,
        OutcomeCode::At,
        OutcomeCode::Ie,
        OutcomeCode::Bp,
        OutcomeCode::Pd,
        OutcomeCode::Na,
    ];

    /// The two-letter wire symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::Ok => "OK",
            OutcomeCode::Rf => "RF",
            OutcomeCode::Rt => "RT",
            OutcomeCode::Tl => "TL",
            OutcomeCode::Ml => "ML",
            OutcomeCode::Ol => "OL",
            OutcomeCode::At => "AT",
            OutcomeCode::Ie => "IE",
            OutcomeCode::Bp => "BP",
            OutcomeCode::Pd => "PD",
            OutcomeCode::Na => "NA",
        }
    }

    /// Map a symbol reported by the tracer. Unknown symbols become `Na`.
    pub fn from_symbol(symbol: &str) -> Self {
        symbol.parse().unwrap_or(OutcomeCode::Na)
    }
}

impl std::fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutcomeCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown outcome code '{}'", s))
    }
}

/// Details captured about a finished session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitDetails {
    /// Status passed to exit_group, when the program got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ExitDetails {
    pub fn with_exit_code(code: i32) -> Self {
        Self {
            exit_code: Some(code),
        }
    }
}

/// The engine's answer to one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Let the traced process proceed.
    Continue,
    /// Kill the traced process with this reason.
    Kill { reason: OutcomeCode },
    /// End the session with this result.
    Finish {
        result: OutcomeCode,
        details: ExitDetails,
    },
}

impl PolicyDecision {
    /// Kill for a restricted function.
    pub fn kill_rf() -> Self {
        PolicyDecision::Kill {
            reason: OutcomeCode::Rf,
        }
    }

    pub fn is_kill(&self) -> bool {
        matches!(self, PolicyDecision::Kill { .. })
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, PolicyDecision::Finish { .. })
    }

    /// True when the tracer will not resume the process after this decision.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PolicyDecision::Continue)
    }
}

/// What the tracer should do with the traced process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Continue,
    Kill,
    FinalizeWithResult,
}

/// The per-event message handed to the tracer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TracerAction {
    pub disposition: Disposition,
    /// Only meaningful for `Kill` and `FinalizeWithResult`.
    pub result_code: Option<OutcomeCode>,
}

impl From<&PolicyDecision> for TracerAction {
    fn from(decision: &PolicyDecision) -> Self {
        match decision {
            PolicyDecision::Continue => TracerAction {
                disposition: Disposition::Continue,
                result_code: None,
            },
            PolicyDecision::Kill { reason } => TracerAction {
                disposition: Disposition::Kill,
                result_code: Some(*reason),
            },
            PolicyDecision::Finish { result, .. } => TracerAction {
                disposition: Disposition::FinalizeWithResult,
                result_code: Some(*result),
            },
        }
    }
}

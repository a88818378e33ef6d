// result.rs: The result record handed back to the job runner.
//
// Shape (camelCase JSON):
//
//   {"returnCode":"RF","output":"...","stderr":"...\nILLEGAL SYSTEM CALL (#59)","details":{}}

use std::fmt;

use serde::{Deserialize, Serialize};
use tg_policy::{ExitDetails, OutcomeCode, SessionReport};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub return_code: OutcomeCode,
    pub output: String,
    pub stderr: String,
    pub details: ExitDetails,
}

impl ResultRecord {
    /// Combine the engine's report with the program's captured output.
    ///
    /// On RF the denial message is appended to stderr on its own line, so
    /// the user sees why the program was stopped.
    pub fn assemble(
        report: &SessionReport,
        output: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        let mut stderr = stderr.into();
        if let Some(message) = report.stderr_suffix() {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(message);
        }
        Self {
            return_code: report.outcome_code,
            output: output.into(),
            stderr,
            details: report.details.clone(),
        }
    }

    /// Record for a fault that escaped the whole session, such as a bad
    /// configuration. Always RT with empty details.
    pub fn setup_failure(err: &dyn fmt::Display) -> Self {
        tracing::error!("session setup failed: {}", err);
        Self {
            return_code: OutcomeCode::Rt,
            output: String::new(),
            stderr: err.to_string(),
            details: ExitDetails::default(),
        }
    }
}

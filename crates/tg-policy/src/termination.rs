// termination.rs: exit_group ends the session.

use crate::decision::{ExitDetails, OutcomeCode, PolicyDecision};
use crate::state::SessionState;

/// Turn the traced program's exit status into the terminal decision.
///
/// Zero is OK, anything else is abnormal termination. The code is recorded
/// in the session details before returning.
pub fn capture_exit(exit_code: i32, state: &mut SessionState) -> PolicyDecision {
    state.record_exit_code(exit_code);
    let result = if exit_code == 0 {
        OutcomeCode::Ok
    } else {
        OutcomeCode::At
    };
    tracing::info!("exit_group({}): session finished with {}", exit_code, result);
    PolicyDecision::Finish {
        result,
        details: ExitDetails::with_exit_code(exit_code),
    }
}

/// The exit status the parent will observe for `exit_group(arg)`.
///
/// The kernel keeps only the low 8 bits, so 256 exits 0 and -1 exits 255.
pub fn exit_status_from_arg(arg: u64) -> i32 {
    (arg & 0xff) as i32
}

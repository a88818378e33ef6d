// runner.rs: Drives one traced process through the policy engine.
//
// The runner sits between the tracer and the dispatcher. It numbers events,
// writes each decision to the audit log when one is attached, and stops
// consulting the engine after the first Kill or Finish: at that point the
// tracer has already killed or reaped the process.

use tg_audit::{AuditError, DecisionLog, DecisionRecord};
use tg_policy::{
    OutcomeCode, PolicyDecision, PolicyDispatcher, SessionConfig, SessionReport, SyscallEvent,
    TracerAction,
};
use uuid::Uuid;

use crate::error::SessionError;

pub struct SessionRunner {
    session_id: Uuid,
    dispatcher: PolicyDispatcher,
    audit: Option<DecisionLog>,
    next_sequence: u64,
    terminal: Option<PolicyDecision>,
    audit_failures: u64,
}

impl SessionRunner {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        Ok(Self::from_dispatcher(PolicyDispatcher::new(config)?))
    }

    pub fn from_dispatcher(dispatcher: PolicyDispatcher) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            dispatcher,
            audit: None,
            next_sequence: 0,
            terminal: None,
            audit_failures: 0,
        }
    }

    /// Record every decision of this session in `log`.
    pub fn with_audit_log(mut self, log: DecisionLog) -> Self {
        self.audit = Some(log);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Number of events the engine has decided so far.
    pub fn events_decided(&self) -> u64 {
        self.next_sequence
    }

    pub fn dispatcher(&self) -> &PolicyDispatcher {
        &self.dispatcher
    }

    /// The Kill or Finish that ended the session, if any.
    pub fn terminal_decision(&self) -> Option<&PolicyDecision> {
        self.terminal.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    /// Decide one event and return the action for the tracer.
    ///
    /// Every event gets an action. Once the session has terminated, further
    /// events are not decided or logged; the terminal decision is returned
    /// again. A failed audit write is logged and counted but never changes
    /// or withholds the decision.
    pub fn handle(&mut self, event: &SyscallEvent<'_>) -> TracerAction {
        if let Some(terminal) = &self.terminal {
            tracing::warn!(
                "session {} already terminated; dropping {:?}",
                self.session_id,
                event
            );
            return TracerAction::from(terminal);
        }

        let decision = self.dispatcher.decide(event);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let action = TracerAction::from(&decision);
        if decision.is_terminal() {
            tracing::info!(
                "session {} terminated after {} events: {:?}",
                self.session_id,
                self.next_sequence,
                decision
            );
            self.terminal = Some(decision.clone());
        }

        if let Err(e) = self.audit_decision(event, sequence, decision) {
            self.audit_failures += 1;
            tracing::error!(
                "session {}: decision #{} not recorded: {}",
                self.session_id,
                sequence,
                e
            );
        }
        action
    }

    fn audit_decision(
        &mut self,
        event: &SyscallEvent<'_>,
        sequence: u64,
        decision: PolicyDecision,
    ) -> Result<(), AuditError> {
        let Some(log) = self.audit.as_mut() else {
            return Ok(());
        };
        let mut record =
            DecisionRecord::new(self.session_id, sequence, event.kind, event.number, decision);
        if let Some(name) = self.dispatcher.syscall_name(event.number) {
            record = record.with_syscall_name(name);
        }
        if let Some(message) = self.dispatcher.state().last_denial() {
            record = record.with_denial(message);
        }
        log.append(&mut record)
    }

    /// Decisions that could not be written to the audit log.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures
    }

    /// Result code of the session so far: the terminal decision's code, or
    /// PD while the process is still running.
    pub fn outcome(&self) -> OutcomeCode {
        match &self.terminal {
            Some(PolicyDecision::Kill { reason }) => *reason,
            Some(PolicyDecision::Finish { result, .. }) => *result,
            Some(PolicyDecision::Continue) | None => OutcomeCode::Pd,
        }
    }

    /// The engine's report, using this session's own outcome.
    pub fn report(&self) -> SessionReport {
        self.dispatcher.report(self.outcome())
    }

    /// The engine's report for an outcome decided outside the engine, such
    /// as TL from the resource layer.
    pub fn report_with(&self, outcome: OutcomeCode) -> SessionReport {
        self.dispatcher.report(outcome)
    }
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("session_id", &self.session_id)
            .field("events_decided", &self.next_sequence)
            .field("audited", &self.audit.is_some())
            .field("audit_failures", &self.audit_failures)
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::tempdir;
    use tg_policy::{Architecture, Disposition, EventKind, NoMemory};

    fn x86_runner() -> SessionRunner {
        let config = SessionConfig::for_workdir("/tmp/tg_run_1/").with_architecture(Architecture::X86_64);
        SessionRunner::new(&config).unwrap()
    }

    #[test]
    fn whitelisted_call_continues() {
        let mut runner = x86_runner();
        let action = runner
            .handle(&SyscallEvent::new(EventKind::Call, 1, [0, 1, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::Continue);
        assert_eq!(runner.outcome(), OutcomeCode::Pd);
        assert_eq!(runner.events_decided(), 1);
    }

    #[test]
    fn kill_is_sticky() {
        let mut runner = x86_runner();
        let action = runner
            .handle(&SyscallEvent::new(EventKind::Call, 59, [0, 0, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::Kill);
        assert_eq!(action.result_code, Some(OutcomeCode::Rf));

        // A whitelisted call after the kill is not decided.
        let action = runner
            .handle(&SyscallEvent::new(EventKind::Call, 1, [0, 1, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::Kill);
        assert_eq!(runner.events_decided(), 1);

        let report = runner.report();
        assert_eq!(report.outcome_code, OutcomeCode::Rf);
        assert_eq!(report.stderr_suffix(), Some("ILLEGAL SYSTEM CALL (#59)"));
    }

    #[test]
    fn exit_group_finishes_with_exit_code() {
        let mut runner = x86_runner();
        let action = runner
            .handle(&SyscallEvent::new(EventKind::Call, 231, [0, 7, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::FinalizeWithResult);
        assert_eq!(runner.outcome(), OutcomeCode::At);
        assert_eq!(runner.report().details.exit_code, Some(7));
    }

    #[test]
    fn external_outcome_overrides() {
        let runner = x86_runner();
        assert_eq!(runner.report_with(OutcomeCode::Tl).outcome_code, OutcomeCode::Tl);
    }

    #[test]
    fn decisions_are_audited_in_order() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("decisions.jsonl");
        let mut runner = x86_runner().with_audit_log(DecisionLog::open(&log_path).unwrap());

        runner.handle(&SyscallEvent::new(EventKind::Call, 12, [0, 0, 0], &NoMemory));
        runner.handle(&SyscallEvent::new(EventKind::Call, 59, [0, 0, 0], &NoMemory));
        // Dropped after the kill; must not reach the log.
        runner.handle(&SyscallEvent::new(EventKind::Call, 1, [0, 1, 0], &NoMemory));

        let records = DecisionLog::read_all(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 0);
        assert_eq!(records[0].syscall_name.as_deref(), Some("brk"));
        assert!(records[0].denial_message.is_none());
        assert_eq!(records[1].sequence, 1);
        assert_eq!(
            records[1].denial_message.as_deref(),
            Some("ILLEGAL SYSTEM CALL (#59)")
        );
        assert!(records.iter().all(|r| r.session_id == runner.session_id()));
        assert_eq!(DecisionLog::verify_chain(&log_path).unwrap().records, 2);
    }

    #[test]
    fn invalid_config_is_config_error() {
        let config = SessionConfig::default()
            .with_readable(["relative/"])
            .with_architecture(Architecture::X86_64);
        match SessionRunner::new(&config) {
            Err(SessionError::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    /// A sink that rejects every write, like a full disk.
    struct FullDisk;

    impl io::Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }
    }

    #[test]
    fn failed_audit_write_keeps_the_decision() {
        let mut runner = x86_runner().with_audit_log(DecisionLog::to_writer(FullDisk));

        let action = runner.handle(&SyscallEvent::new(EventKind::Call, 1, [0, 1, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::Continue);

        let action = runner.handle(&SyscallEvent::new(EventKind::Call, 231, [0, 0, 0], &NoMemory));
        assert_eq!(action.disposition, Disposition::FinalizeWithResult);
        assert_eq!(action.result_code, Some(OutcomeCode::Ok));
        assert!(runner.is_terminated());
        assert_eq!(runner.outcome(), OutcomeCode::Ok);
        assert_eq!(runner.audit_failures(), 2);
    }
}

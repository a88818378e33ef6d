// dispatcher.rs: The per-event entry point of the policy engine.
//
// The tracer calls `decide()` once for every event, in the order the kernel
// delivers them, and waits for the answer before resuming the traced
// process. Routing:
//
// 1. open (call)        -> path authorizer
// 2. exit_group (call)  -> termination capture, session becomes Finished
// 3. unlink (call)      -> unlink authorizer; open/unlink returns pass
// 4. other call/return  -> compat-mode calls are killed on x86_64, then
//                          whitelist lookup
// 5. other events       -> continue
//
// `decide()` always returns a decision. Handler errors and panics become
// Kill(RF) with a diagnostic message, since an unanswered event would stall
// the traced process.

use std::panic::{self, AssertUnwindSafe};

use crate::arch::{ArchProfile, Architecture, SyscallCategory};
use crate::config::SessionConfig;
use crate::decision::{OutcomeCode, PolicyDecision};
use crate::error::{ConfigError, PolicyError};
use crate::event::{EventKind, SyscallEvent};
use crate::path::PathAuthorizer;
use crate::state::{SessionReport, SessionState};
use crate::termination::{capture_exit, exit_status_from_arg};
use crate::unlink::UnlinkAuthorizer;
use crate::whitelist::SyscallWhitelist;

/// Lifecycle of one traced process, as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    /// exit_group was seen. Absorbing.
    Finished,
}

/// Decides every syscall event of one traced process.
///
/// Owns its whitelist and state; nothing is shared between dispatchers.
pub struct PolicyDispatcher {
    profile: Box<dyn ArchProfile>,
    whitelist: SyscallWhitelist,
    paths: PathAuthorizer,
    unlinks: UnlinkAuthorizer,
    state: SessionState,
    finished: Option<PolicyDecision>,
}

impl PolicyDispatcher {
    /// Build a dispatcher for the config's architecture (or the host's).
    ///
    /// Fails when the architecture is unsupported or the config is invalid.
    /// This is the only fatal check; it happens before tracing starts.
    pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let arch = config.resolve_architecture()?;
        Self::with_profile(arch.profile(), config)
    }

    /// Build a dispatcher around an explicit architecture profile.
    ///
    /// A config that pins an architecture must name the profile's own.
    pub fn with_profile(
        profile: Box<dyn ArchProfile>,
        config: &SessionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(configured) = config.architecture {
            if configured != profile.architecture() {
                return Err(ConfigError::ArchitectureMismatch {
                    configured,
                    profile: profile.architecture(),
                });
            }
        }

        let whitelist = SyscallWhitelist::build(
            profile
                .safe_syscalls()
                .iter()
                .map(|(number, _)| *number)
                .chain(config.extra_safe_syscalls.iter().copied()),
        )?;
        let paths = config.path_authorizer();
        let unlinks = UnlinkAuthorizer::new(config.scratch_root.clone());

        tracing::info!(
            "policy session started: arch={}, {} safe syscalls, {} path rules, scratch root '{}'",
            profile.architecture(),
            whitelist.len(),
            paths.rules().len(),
            unlinks.scratch_root()
        );

        Ok(Self {
            profile,
            whitelist,
            paths,
            unlinks,
            state: SessionState::new(),
            finished: None,
        })
    }

    /// Decide one event. Exactly one decision per call.
    ///
    /// After a Finish decision the session is terminal: later calls are
    /// ignored and return that same Finish decision again.
    pub fn decide(&mut self, event: &SyscallEvent<'_>) -> PolicyDecision {
        if let Some(finish) = &self.finished {
            tracing::warn!(
                "event {:?} after session finished; ignoring",
                event
            );
            return finish.clone();
        }

        let routed = panic::catch_unwind(AssertUnwindSafe(|| self.route(event)));
        let decision = match routed {
            Ok(Ok(decision)) => decision,
            Ok(Err(err)) => self.internal_fault(event, &err.to_string()),
            Err(_) => self.internal_fault(event, "handler panicked"),
        };

        if !decision.is_kill() {
            self.state.clear_denial();
        }
        if decision.is_finish() {
            self.finished = Some(decision.clone());
        }

        tracing::debug!(
            "{} #{} ({}) -> {:?}",
            event.kind,
            event.number,
            self.profile.syscall_name(event.number).unwrap_or("?"),
            decision
        );
        decision
    }

    fn route(&mut self, event: &SyscallEvent<'_>) -> Result<PolicyDecision, PolicyError> {
        if event.kind == EventKind::Other {
            return Ok(PolicyDecision::Continue);
        }

        let qualifier = self.profile.qualifier(event);
        match (event.kind, self.profile.classify(event.number, qualifier)) {
            (EventKind::Call, SyscallCategory::Open) => {
                let path = event.read_arg0_string()?;
                self.paths
                    .authorize_open(&path, event.arg1(), &mut self.state)
            }
            (EventKind::Call, SyscallCategory::ExitGroup) => Ok(capture_exit(
                exit_status_from_arg(event.arg0()),
                &mut self.state,
            )),
            (EventKind::Call, SyscallCategory::Unlink) => {
                let path = event.read_arg0_string()?;
                self.unlinks.authorize_unlink(&path, &mut self.state)
            }
            // The matching call was already vetted.
            (EventKind::Return, SyscallCategory::Open | SyscallCategory::Unlink) => {
                Ok(PolicyDecision::Continue)
            }
            _ => self.check_whitelist(event.number, qualifier),
        }
    }

    fn check_whitelist(&mut self, number: u64, qualifier: u64) -> Result<PolicyDecision, PolicyError> {
        if qualifier != 0 && self.profile.rejects_compat_mode() {
            self.state.record_denial(format!(
                "ILLEGAL SYSTEM CALL (#{}, compatibility mode {})",
                number, qualifier
            ));
            return Ok(PolicyDecision::kill_rf());
        }
        if self.whitelist.check(number)? {
            Ok(PolicyDecision::Continue)
        } else {
            self.state
                .record_denial(format!("ILLEGAL SYSTEM CALL (#{})", number));
            Ok(PolicyDecision::kill_rf())
        }
    }

    fn internal_fault(&mut self, event: &SyscallEvent<'_>, reason: &str) -> PolicyDecision {
        self.state.record_denial(format!(
            "INTERNAL ERROR on {} of syscall #{}: {}",
            event.kind, event.number, reason
        ));
        PolicyDecision::kill_rf()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.finished.is_some() {
            SessionPhase::Finished
        } else {
            SessionPhase::Running
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == SessionPhase::Finished
    }

    pub fn architecture(&self) -> Architecture {
        self.profile.architecture()
    }

    pub fn syscall_name(&self, number: u64) -> Option<&'static str> {
        self.profile.syscall_name(number)
    }

    pub fn whitelist(&self) -> &SyscallWhitelist {
        &self.whitelist
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The session report, given the final result the tracer reports.
    pub fn report(&self, outcome: OutcomeCode) -> SessionReport {
        self.state.report(outcome)
    }
}

impl std::fmt::Debug for PolicyDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyDispatcher")
            .field("architecture", &self.profile.architecture())
            .field("whitelist", &self.whitelist)
            .field("paths", &self.paths)
            .field("unlinks", &self.unlinks)
            .field("state", &self.state)
            .field("phase", &self.phase())
            .finish()
    }
}

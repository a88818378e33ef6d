// replay.rs: Drive a recorded syscall trace through a session.
//
// A trace is JSON Lines, one event per line:
//
//   {"kind":"call","number":2,"ext":[0,4096,0],"strings":{"4096":"/lib/libc.so.6"}}
//
// `strings` maps tracee addresses to the NUL-terminated string stored there
// at the time of the call. Reading any other address fails the same way an
// unreadable tracee address does.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tg_audit::DecisionLog;
use tg_policy::{
    EventKind, PolicyError, SessionConfig, SessionReport, SyscallEvent, TraceeMemory,
};
use uuid::Uuid;

use crate::error::SessionError;
use crate::runner::SessionRunner;

/// One event of a recorded trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub number: u64,
    #[serde(default)]
    pub ext: [u64; 3],
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub strings: BTreeMap<u64, String>,
}

impl RecordedEvent {
    pub fn call(number: u64, ext: [u64; 3]) -> Self {
        Self {
            kind: EventKind::Call,
            number,
            ext,
            strings: BTreeMap::new(),
        }
    }

    pub fn ret(number: u64, ext: [u64; 3]) -> Self {
        Self {
            kind: EventKind::Return,
            ..Self::call(number, ext)
        }
    }

    /// Attach the string found at `addr` in the tracee.
    pub fn with_string(mut self, addr: u64, value: impl Into<String>) -> Self {
        self.strings.insert(addr, value.into());
        self
    }
}

/// Tracee memory recorded alongside one event.
#[derive(Debug, Clone, Copy)]
pub struct ReplayMemory<'a> {
    strings: &'a BTreeMap<u64, String>,
}

impl<'a> ReplayMemory<'a> {
    pub fn new(strings: &'a BTreeMap<u64, String>) -> Self {
        Self { strings }
    }
}

impl TraceeMemory for ReplayMemory<'_> {
    fn read_string(&self, addr: u64) -> Result<Vec<u8>, PolicyError> {
        self.strings
            .get(&addr)
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| PolicyError::MemoryUnreadable {
                addr,
                reason: "address not captured in trace".to_string(),
            })
    }
}

/// Parse a JSONL trace. Blank lines are skipped; line numbers in errors
/// are 1-based.
pub fn parse_events(reader: impl BufRead) -> Result<Vec<RecordedEvent>, SessionError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SessionError::InvalidEvent {
            line: index + 1,
            source: serde_json::Error::io(e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| SessionError::InvalidEvent {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Read a JSONL trace file.
pub fn read_events(path: &Path) -> Result<Vec<RecordedEvent>, SessionError> {
    let file = File::open(path).map_err(|source| SessionError::TraceReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(BufReader::new(file))
}

/// What a replay produced.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub session_id: Uuid,
    /// Events the engine decided. Events after a Kill or Finish are not
    /// counted.
    pub events_decided: u64,
    /// Events left in the trace after the session terminated.
    pub events_dropped: usize,
    /// Decisions that could not be written to the audit log.
    pub audit_failures: u64,
    pub report: SessionReport,
}

/// Replay a whole trace through a fresh session built from `config`.
///
/// A trace that ends without Kill or Finish reports PD.
pub fn replay(
    config: &SessionConfig,
    events: &[RecordedEvent],
    audit: Option<DecisionLog>,
) -> Result<ReplaySummary, SessionError> {
    let mut runner = SessionRunner::new(config)?;
    if let Some(log) = audit {
        runner = runner.with_audit_log(log);
    }

    let mut events_dropped = 0;
    for (index, recorded) in events.iter().enumerate() {
        if runner.is_terminated() {
            events_dropped = events.len() - index;
            tracing::debug!("dropping {} events after termination", events_dropped);
            break;
        }
        let memory = ReplayMemory::new(&recorded.strings);
        let event = SyscallEvent::new(recorded.kind, recorded.number, recorded.ext, &memory);
        runner.handle(&event);
    }

    if !runner.is_terminated() {
        tracing::info!(
            "trace ended after {} events without termination",
            runner.events_decided()
        );
    }

    Ok(ReplaySummary {
        session_id: runner.session_id(),
        events_decided: runner.events_decided(),
        events_dropped,
        audit_failures: runner.audit_failures(),
        report: runner.report(),
    })
}

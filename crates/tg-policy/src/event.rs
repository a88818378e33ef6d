// event.rs: Syscall events delivered by the tracer.
//
// The tracer owns the traced process. It hands the engine one event at a
// time, plus a read-only window into the tracee's memory for string
// arguments (paths passed to open/unlink).

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Which phase of the tracee's execution produced the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Syscall entry. Arguments are available.
    Call,
    /// Syscall exit.
    Return,
    /// Anything else the tracer reports (signals, exec, quota events).
    Other,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Call => write!(f, "call"),
            EventKind::Return => write!(f, "return"),
            EventKind::Other => write!(f, "other"),
        }
    }
}

/// Read access to the traced process's address space.
///
/// Implemented by the tracer. Reads are bounded and synchronous.
pub trait TraceeMemory {
    /// Read the NUL-terminated string starting at `addr`.
    ///
    /// Returns the bytes without the terminator.
    fn read_string(&self, addr: u64) -> Result<Vec<u8>, PolicyError>;
}

/// A single intercepted event, read-only to the engine.
///
/// `ext` holds the architecture-specific extension values. On x86_64
/// `ext[0]` is the calling-mode qualifier (0 for native 64-bit calls,
/// non-zero for 32-bit compatibility calls). `ext[1]` and `ext[2]` carry
/// the first two syscall arguments on every architecture.
#[derive(Clone, Copy)]
pub struct SyscallEvent<'a> {
    pub kind: EventKind,
    pub number: u64,
    pub ext: [u64; 3],
    pub memory: &'a dyn TraceeMemory,
}

impl<'a> SyscallEvent<'a> {
    pub fn new(kind: EventKind, number: u64, ext: [u64; 3], memory: &'a dyn TraceeMemory) -> Self {
        Self {
            kind,
            number,
            ext,
            memory,
        }
    }

    /// First syscall argument.
    pub fn arg0(&self) -> u64 {
        self.ext[1]
    }

    /// Second syscall argument.
    pub fn arg1(&self) -> u64 {
        self.ext[2]
    }

    /// Read the string the first argument points to.
    pub fn read_arg0_string(&self) -> Result<Vec<u8>, PolicyError> {
        self.memory.read_string(self.arg0())
    }
}

impl std::fmt::Debug for SyscallEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyscallEvent")
            .field("kind", &self.kind)
            .field("number", &self.number)
            .field("ext", &self.ext)
            .finish_non_exhaustive()
    }
}

/// Memory handle for events that carry no pointer arguments.
///
/// Every read fails, which the dispatcher treats like any other
/// unreadable address.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemory;

impl TraceeMemory for NoMemory {
    fn read_string(&self, addr: u64) -> Result<Vec<u8>, PolicyError> {
        Err(PolicyError::MemoryUnreadable {
            addr,
            reason: "no tracee memory attached".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_come_from_ext_one_and_two() {
        let event = SyscallEvent::new(EventKind::Call, 2, [0, 0x1000, 0o2000000], &NoMemory);
        assert_eq!(event.arg0(), 0x1000);
        assert_eq!(event.arg1(), 0o2000000);
    }

    #[test]
    fn no_memory_fails_every_read() {
        match NoMemory.read_string(0xdead) {
            Err(PolicyError::MemoryUnreadable { addr, .. }) => assert_eq!(addr, 0xdead),
            other => panic!("expected MemoryUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&EventKind::Return).unwrap();
        assert_eq!(json, "\"return\"");
    }
}

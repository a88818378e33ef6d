// arch.rs: Per-architecture syscall profiles.
//
// Each supported architecture gets one ArchProfile implementation that knows
// its syscall numbers, its always-safe set, and how to read the calling-mode
// qualifier out of an event. The dispatcher picks a profile once at
// construction and never branches on the architecture again.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::event::SyscallEvent;

/// A machine type the engine has a syscall profile for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Architecture {
    #[serde(rename = "x86_64", alias = "amd64")]
    X86_64,
    #[serde(rename = "i686", alias = "i386", alias = "x86")]
    I686,
}

impl Architecture {
    /// The architecture this binary was compiled for.
    ///
    /// Fails on targets without a profile. Callers check this once before
    /// tracing starts; it is never consulted per event.
    pub fn host() -> Result<Self, PolicyError> {
        if cfg!(target_arch = "x86_64") {
            Ok(Architecture::X86_64)
        } else if cfg!(target_arch = "x86") {
            Ok(Architecture::I686)
        } else {
            Err(PolicyError::UnsupportedArchitecture(
                std::env::consts::ARCH.to_string(),
            ))
        }
    }

    /// The profile for this architecture.
    pub fn profile(self) -> Box<dyn ArchProfile> {
        match self {
            Architecture::X86_64 => Box::new(X86_64Profile),
            Architecture::I686 => Box::new(I686Profile),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::I686 => "i686",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = PolicyError;

    /// Accepts `uname -m` style machine names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "i686" | "i586" | "i486" | "i386" | "x86" => Ok(Architecture::I686),
            other => Err(PolicyError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

/// How the dispatcher routes a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallCategory {
    /// `open`: goes to the path authorizer.
    Open,
    /// `unlink`: goes to the unlink authorizer.
    Unlink,
    /// `exit_group`: goes to termination capture.
    ExitGroup,
    /// Everything else: whitelist lookup.
    Generic,
}

/// Syscall numbers that get dedicated handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialSyscalls {
    pub open: u64,
    pub unlink: u64,
    pub exit_group: u64,
}

/// Architecture strategy used by the dispatcher.
pub trait ArchProfile: Send + Sync {
    fn architecture(&self) -> Architecture;

    /// Syscalls allowed unconditionally, with their names.
    fn safe_syscalls(&self) -> &'static [(u32, &'static str)];

    /// Numbers of the syscalls with dedicated handlers.
    fn special(&self) -> SpecialSyscalls;

    /// The calling-mode qualifier of an event (0 means native).
    fn qualifier(&self, event: &SyscallEvent<'_>) -> u64;

    /// Whether a non-zero qualifier is an automatic kill.
    fn rejects_compat_mode(&self) -> bool;

    /// Route a syscall. Only native-mode calls are ever special.
    fn classify(&self, number: u64, qualifier: u64) -> SyscallCategory {
        if qualifier != 0 {
            return SyscallCategory::Generic;
        }
        let special = self.special();
        if number == special.open {
            SyscallCategory::Open
        } else if number == special.unlink {
            SyscallCategory::Unlink
        } else if number == special.exit_group {
            SyscallCategory::ExitGroup
        } else {
            SyscallCategory::Generic
        }
    }

    /// Name of a whitelisted or specially handled syscall, for diagnostics.
    fn syscall_name(&self, number: u64) -> Option<&'static str> {
        let special = self.special();
        if number == special.open {
            return Some("open");
        }
        if number == special.unlink {
            return Some("unlink");
        }
        if number == special.exit_group {
            return Some("exit_group");
        }
        self.safe_syscalls()
            .iter()
            .find(|(n, _)| u64::from(*n) == number)
            .map(|(_, name)| *name)
    }
}

/// Essential x86_64 syscalls: I/O on already-open descriptors, memory
/// management, signal plumbing and identity queries.
const X86_64_SAFE: &[(u32, &str)] = &[
    (0, "read"),
    (1, "write"),
    (2, "open"),
    (3, "close"),
    (4, "stat"),
    (5, "fstat"),
    (6, "lstat"),
    (8, "lseek"),
    (9, "mmap"),
    (10, "mprotect"),
    (11, "munmap"),
    (12, "brk"),
    (13, "rt_sigaction"),
    (14, "rt_sigprocmask"),
    (15, "rt_sigreturn"),
    (16, "ioctl"),
    (21, "access"),
    (25, "mremap"),
    (32, "dup"),
    (33, "dup2"),
    (39, "getpid"),
    (63, "uname"),
    (72, "fcntl"),
    (78, "getdents"),
    (79, "getcwd"),
    (89, "readlink"),
    (97, "getrlimit"),
    (100, "times"),
    (102, "getuid"),
    (104, "getgid"),
    (107, "geteuid"),
    (108, "getegid"),
    (158, "arch_prctl"),
    (202, "futex"),
    (218, "set_tid_address"),
    (231, "exit_group"),
    (273, "set_robust_list"),
];

const I686_SAFE: &[(u32, &str)] = &[
    (3, "read"),
    (4, "write"),
    (19, "lseek"),
    (45, "brk"),
    (54, "ioctl"),
    (90, "mmap"),
    (91, "munmap"),
    (122, "uname"),
    (125, "mprotect"),
    (140, "_llseek"),
    (163, "mremap"),
    (192, "mmap2"),
    (197, "fstat64"),
    (224, "gettid"),
    (243, "set_thread_area"),
    (252, "exit_group"),
];

/// 64-bit x86. `ext[0]` distinguishes native calls from `int 0x80`
/// compatibility calls, which use a different number table.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86_64Profile;

impl ArchProfile for X86_64Profile {
    fn architecture(&self) -> Architecture {
        Architecture::X86_64
    }

    fn safe_syscalls(&self) -> &'static [(u32, &'static str)] {
        X86_64_SAFE
    }

    fn special(&self) -> SpecialSyscalls {
        SpecialSyscalls {
            open: 2,
            unlink: 87,
            exit_group: 231,
        }
    }

    fn qualifier(&self, event: &SyscallEvent<'_>) -> u64 {
        event.ext[0]
    }

    fn rejects_compat_mode(&self) -> bool {
        true
    }
}

/// 32-bit x86. There is no compatibility mode, so the qualifier is always 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct I686Profile;

impl ArchProfile for I686Profile {
    fn architecture(&self) -> Architecture {
        Architecture::I686
    }

    fn safe_syscalls(&self) -> &'static [(u32, &'static str)] {
        I686_SAFE
    }

    fn special(&self) -> SpecialSyscalls {
        SpecialSyscalls {
            open: 5,
            unlink: 10,
            exit_group: 252,
        }
    }

    fn qualifier(&self, _event: &SyscallEvent<'_>) -> u64 {
        0
    }

    fn rejects_compat_mode(&self) -> bool {
        false
    }
}

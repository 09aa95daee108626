//! Exit statuses of supervised children and their mapping onto the
//! launcher's own exit code.

use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use super::spawner::SpawnError;

/// Exit code used when a command could not be found.
pub const EXIT_NOT_FOUND: u8 = 127;
/// Exit code used when a command exists but could not be executed.
pub const EXIT_NOT_EXECUTABLE: u8 = 126;
/// Offset added to a signal number when a child was killed by that signal.
pub const SIGNAL_EXIT_BASE: u8 = 128;

/// How a supervised child finished, or why it never ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReport {
    /// The child exited with a status code.
    Code(i32),
    /// The child was terminated by a signal.
    Signal(i32),
    /// The child could not be spawned.
    SpawnFailed {
        /// Kind of the spawn error.
        kind: io::ErrorKind,
        /// Rendered spawn error.
        message: String,
    },
    /// The child was never started because the launcher received a signal.
    NotStarted {
        /// Signal that stopped the launch.
        signal: i32,
    },
}

impl ExitReport {
    /// Converts an OS exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Code(code),
            (None, Some(signal)) => Self::Signal(signal),
            (None, None) => Self::Code(1),
        }
    }

    /// Records a spawn failure.
    #[must_use]
    pub fn from_spawn_error(error: &SpawnError) -> Self {
        Self::SpawnFailed {
            kind: error.source.kind(),
            message: error.to_string(),
        }
    }

    /// Exit code the launcher reports for this outcome, following shell
    /// conventions.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Code(code) => u8::try_from(code & 0xff).unwrap_or(u8::MAX),
            Self::Signal(signal) | Self::NotStarted { signal } => signal_exit_code(*signal),
            Self::SpawnFailed { kind, .. } => match kind {
                io::ErrorKind::NotFound => EXIT_NOT_FOUND,
                io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
                _ => 1,
            },
        }
    }

    /// True when the child ran and exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

fn signal_exit_code(signal: i32) -> u8 {
    u8::try_from(signal)
        .ok()
        .and_then(|number| SIGNAL_EXIT_BASE.checked_add(number))
        .unwrap_or(u8::MAX)
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(signal) => write!(f, "terminated by signal {signal}"),
            Self::SpawnFailed { message, .. } => f.write_str(message),
            Self::NotStarted { signal } => write!(f, "not started (signal {signal})"),
        }
    }
}

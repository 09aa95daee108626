//! Child process supervision: spawning, the readiness gate, signal relay, and
//! the launch sequence tying them together.

use std::time::Duration;

mod errors;
pub(crate) mod exit;
pub(crate) mod launch;
pub(crate) mod readiness;
pub(crate) mod reaper;
pub(crate) mod signals;
pub(crate) mod spawner;
pub(crate) mod status;

pub use errors::LaunchError;
pub use exit::ExitReport;
pub use launch::{ApiReport, LaunchOutcome, LaunchStage, run_launcher};
pub use readiness::{ProbeError, ReadinessOutcome};
pub use signals::RelayError;
pub use spawner::{ServiceRole, SpawnError};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Pause between liveness checks while supervising or stopping children.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

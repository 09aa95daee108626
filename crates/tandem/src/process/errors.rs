//! Defines the error surface for launching and supervising the services.

use std::io;

use thiserror::Error;

use super::readiness::{ProbeError, ReadinessOutcome};
use super::signals::RelayError;

/// Errors that stop the launcher before the bot's exit status is known.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The signal relay could not be installed.
    #[error("failed to start signal relay: {source}")]
    Relay {
        /// Underlying relay error.
        #[source]
        source: RelayError,
    },
    /// A readiness probe could not be built.
    #[error("failed to prepare readiness probe: {source}")]
    Probe {
        /// Underlying probe error.
        #[source]
        source: ProbeError,
    },
    /// Readiness was required but not reached.
    #[error("api did not become ready: {outcome}")]
    NotReady {
        /// Result of the readiness gate.
        outcome: ReadinessOutcome,
    },
    /// Waiting for the bot failed.
    #[error("failed to wait for bot process {pid}: {source}")]
    WaitBot {
        /// Bot process id.
        pid: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<RelayError> for LaunchError {
    fn from(source: RelayError) -> Self {
        Self::Relay { source }
    }
}

impl From<ProbeError> for LaunchError {
    fn from(source: ProbeError) -> Self {
        Self::Probe { source }
    }
}

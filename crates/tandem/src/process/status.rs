//! Status snapshot describing the launcher's progress for operators.
//!
//! The snapshot is rewritten on every lifecycle transition and removed when
//! the launcher exits. Writing it is best-effort: failures are logged and the
//! launch continues.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use serde::Serialize;
use tempfile::Builder;
use thiserror::Error;
use tracing::{debug, warn};

use tandem_config::RuntimePaths;

use super::PROCESS_TARGET;
use super::launch::LaunchStage;

/// Errors raised while publishing the status snapshot.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Writing the snapshot file failed.
    #[error("failed to write status snapshot '{path}': {source}")]
    Write {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the snapshot failed.
    #[error("failed to serialise status snapshot: {0}")]
    Serialise(#[from] serde_json::Error),
    /// The system clock reported a time before the Unix epoch.
    #[error("failed to read system time: {0}")]
    Clock(#[from] SystemTimeError),
}

/// Contents of the status file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusSnapshot {
    pub(crate) stage: LaunchStage,
    pub(crate) pid: u32,
    pub(crate) api_pid: Option<u32>,
    pub(crate) bot_pid: Option<u32>,
    pub(crate) timestamp: u64,
}

/// Owns the status file for the lifetime of a launch.
#[derive(Debug)]
pub(crate) struct StatusFile {
    path: PathBuf,
    pid: u32,
}

impl StatusFile {
    pub(crate) fn new(paths: &RuntimePaths, pid: u32) -> Self {
        Self {
            path: paths.status_path().to_path_buf(),
            pid,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the snapshot, logging rather than returning failures.
    pub(crate) fn record(&self, stage: LaunchStage, api_pid: Option<u32>, bot_pid: Option<u32>) {
        if let Err(error) = self.publish(stage, api_pid, bot_pid) {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "status snapshot not updated"
            );
        }
    }

    fn publish(
        &self,
        stage: LaunchStage,
        api_pid: Option<u32>,
        bot_pid: Option<u32>,
    ) -> Result<(), StatusError> {
        let snapshot = StatusSnapshot {
            stage,
            pid: self.pid,
            api_pid,
            bot_pid,
            timestamp: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        };
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        replace_file(&self.path, &payload).map_err(|source| StatusError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            target: PROCESS_TARGET,
            stage = %stage,
            file = %self.path.display(),
            "status snapshot updated"
        );
        Ok(())
    }
}

impl Drop for StatusFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to remove status snapshot"
                );
            }
            _ => {}
        }
    }
}

/// Replaces `path` via a synced sibling temporary file and a rename, so
/// readers see either the previous snapshot or the new one.
fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "status path has no parent"))?;
    let mut staged = Builder::new()
        .prefix(".tandem.status")
        .permissions(Permissions::from_mode(0o644))
        .tempfile_in(directory)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}

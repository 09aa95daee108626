//! Derives runtime artefact paths for the launcher.
//!
//! The runtime directory houses the status snapshot the launcher rewrites on
//! every lifecycle transition, so operators and container probes can see
//! which stage the launcher reached and which child processes it owns.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const STATUS_FILE_NAME: &str = "tandem.status";

/// Canonical paths for runtime artefacts written by the launcher.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    status_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the configuration, creating the directory.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        Self::prepare(config.runtime_dir())
    }

    /// Creates the runtime directory at `runtime_dir` and derives its paths.
    pub fn prepare(runtime_dir: &Path) -> Result<Self, RuntimePathsError> {
        fs::create_dir_all(runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            status_path: runtime_dir.join(STATUS_FILE_NAME),
            runtime_dir: runtime_dir.to_path_buf(),
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the status snapshot.
    #[must_use]
    pub fn status_path(&self) -> &Path {
        self.status_path.as_path()
    }
}

/// Errors raised while deriving launcher runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

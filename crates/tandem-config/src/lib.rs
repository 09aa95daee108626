//! Shared configuration for the `tandem` launcher.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a TOML
//! file named by `--config-path` or `TANDEM_CONFIG_PATH`, then `TANDEM_*`
//! environment variables, then command-line flags. Later layers win. The
//! resolved [`Config`] describes the two services, the readiness strategy used
//! between them, supervision options, and telemetry settings.

mod command;
mod defaults;
mod logging;
mod readiness;
mod runtime;

use std::error::Error as StdError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::{ServiceCommand, ServiceCommandParseError};
pub use defaults::{
    DEFAULT_API_COMMAND, DEFAULT_API_PORT, DEFAULT_BOT_COMMAND, DEFAULT_HEALTH_PATH,
    DEFAULT_LOG_FILTER, DEFAULT_PROBE_INTERVAL_MS, DEFAULT_READINESS_TIMEOUT_MS,
    DEFAULT_SHUTDOWN_GRACE_MS, DEFAULT_STARTUP_DELAY_MS, default_api_command,
    default_bot_command, default_health_path, default_log_filter_string, default_log_format,
    default_readiness_mode, default_runtime_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use readiness::ReadinessMode;
pub use runtime::{RuntimePaths, RuntimePathsError};

/// Errors raised while resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Flags, environment, or the configuration file could not be merged.
    #[error("failed to load configuration: {source}")]
    Load {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// A value was well-formed but unusable.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Configuration key holding the value.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<Arc<OrthoError>> for ConfigError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Load { source }
    }
}

impl ConfigError {
    /// Returns the command-line parser error behind this failure, if any.
    ///
    /// Help and version requests surface as parser errors too; callers print
    /// them through clap and exit with clap's own status.
    #[must_use]
    pub fn cli_error(&self) -> Option<&clap::Error> {
        let Self::Load { source } = self else {
            return None;
        };
        let mut cause: Option<&(dyn StdError + 'static)> = Some(source.as_ref());
        while let Some(error) = cause {
            if let Some(clap_error) = error.downcast_ref::<clap::Error>() {
                return Some(clap_error);
            }
            if let Some(boxed) = error.downcast_ref::<Box<clap::Error>>() {
                return Some(boxed.as_ref());
            }
            cause = error.source();
        }
        None
    }
}

/// Resolved launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TANDEM")]
pub struct Config {
    /// Command line of the background API process.
    #[ortho_config(default = default_api_command())]
    pub api_command: ServiceCommand,
    /// Command line of the foreground bot process.
    #[ortho_config(default = default_bot_command())]
    pub bot_command: ServiceCommand,
    /// Port the API listens on; used by readiness probes.
    #[ortho_config(default = DEFAULT_API_PORT)]
    pub api_port: u16,
    /// Fixed delay used by [`ReadinessMode::Delay`].
    #[ortho_config(default = DEFAULT_STARTUP_DELAY_MS)]
    pub startup_delay_ms: u64,
    /// Strategy deciding when the bot may start: `delay`, `tcp`, or `http`.
    #[ortho_config(default = default_readiness_mode())]
    pub readiness: ReadinessMode,
    /// Upper bound on probing in the probe modes.
    #[ortho_config(default = DEFAULT_READINESS_TIMEOUT_MS)]
    pub readiness_timeout_ms: u64,
    /// Pause between probe attempts.
    #[ortho_config(default = DEFAULT_PROBE_INTERVAL_MS)]
    pub probe_interval_ms: u64,
    /// Route polled by the HTTP probe.
    #[ortho_config(default = default_health_path())]
    pub health_path: String,
    /// Abort before starting the bot unless readiness was reached.
    #[ortho_config(default = false)]
    pub require_ready: bool,
    /// Stop the API when the bot exits and the bot when the API exits.
    #[ortho_config(default = false)]
    pub link_lifecycles: bool,
    /// Grace period between `SIGTERM` and `SIGKILL` when stopping a child.
    #[ortho_config(default = DEFAULT_SHUTDOWN_GRACE_MS)]
    pub shutdown_grace_ms: u64,
    /// Working directory for both children; inherited when unset.
    pub working_dir: Option<PathBuf>,
    /// Directory receiving the status snapshot.
    #[ortho_config(default = default_runtime_dir())]
    pub runtime_dir: PathBuf,
    /// Log filter expression, for example `info` or `tandem=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format: `json` or `compact`.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_command: default_api_command(),
            bot_command: default_bot_command(),
            api_port: DEFAULT_API_PORT,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            readiness: default_readiness_mode(),
            readiness_timeout_ms: DEFAULT_READINESS_TIMEOUT_MS,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            health_path: default_health_path(),
            require_ready: false,
            link_lifecycles: false,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            working_dir: None,
            runtime_dir: default_runtime_dir(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from explicit arguments.
    ///
    /// `args[0]` is the binary name. The environment and any configuration
    /// file named by `--config-path` or `TANDEM_CONFIG_PATH` are merged
    /// beneath the flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer cannot be parsed or merged,
    /// and [`ConfigError::Invalid`] when the merged values are unusable.
    pub fn resolve_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::load_from_iter(args)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.readiness.probes() && self.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "probe_interval_ms",
                reason: "must be greater than zero when probing".to_owned(),
            });
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "health_path",
                reason: format!("'{}' must start with '/'", self.health_path),
            });
        }
        Ok(())
    }

    /// Fixed delay between starting the API and starting the bot.
    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Upper bound on readiness probing.
    #[must_use]
    pub const fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Pause between readiness probe attempts.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Grace period granted to a child between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Directory receiving the status snapshot.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

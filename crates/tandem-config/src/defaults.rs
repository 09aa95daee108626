use std::env;
use std::path::PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::command::ServiceCommand;
use crate::logging::LogFormat;
use crate::readiness::ReadinessMode;

/// Command started in the background before the wait step.
pub const DEFAULT_API_COMMAND: &str = "uvicorn miniapp.api:app --host 0.0.0.0 --port 8000";

/// Command started in the foreground once the wait step has completed.
pub const DEFAULT_BOT_COMMAND: &str = "python main.py";

/// Port the API process is expected to bind on all interfaces.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Fixed delay between starting the API and starting the bot.
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 3_000;

/// Upper bound on the time spent probing for API readiness.
pub const DEFAULT_READINESS_TIMEOUT_MS: u64 = 30_000;

/// Pause between two readiness probe attempts.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 200;

/// Route polled by the HTTP readiness probe.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Time a child is given to exit after `SIGTERM` before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned health route used where allocation is required.
#[must_use]
pub fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_owned()
}

/// Default API command parsed into its program and arguments.
#[must_use]
pub fn default_api_command() -> ServiceCommand {
    ServiceCommand::new(
        "uvicorn",
        ["miniapp.api:app", "--host", "0.0.0.0", "--port", "8000"],
    )
}

/// Default bot command parsed into its program and arguments.
#[must_use]
pub fn default_bot_command() -> ServiceCommand {
    ServiceCommand::new("python", ["main.py"])
}

/// Default readiness strategy: the fixed delay.
#[must_use]
pub const fn default_readiness_mode() -> ReadinessMode {
    ReadinessMode::Delay
}

/// Owned log filter value used where allocation is required.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the directory that holds the launcher status snapshot.
#[must_use]
pub fn default_runtime_dir() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push("tandem");
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push("tandem");
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push("tandem");
        dir
    }
}

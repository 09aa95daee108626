//! Spawning and controlling the two supervised services.

use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use thiserror::Error;

use tandem_config::ServiceCommand;

use super::exit::ExitReport;

/// The two services run by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRole {
    /// Background HTTP API.
    Api,
    /// Foreground bot.
    Bot,
}

impl ServiceRole {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service command could not be started.
#[derive(Debug, Error)]
#[error("failed to spawn {role} command '{program}': {source}")]
pub struct SpawnError {
    /// Service that failed to start.
    pub role: ServiceRole,
    /// Program named by the command.
    pub program: String,
    /// Underlying IO error.
    #[source]
    pub source: io::Error,
}

/// A running child process.
pub trait ServiceProcess: Send {
    /// Process id, which is also the id of the child's process group.
    fn id(&self) -> u32;

    /// Returns the exit report if the child has finished.
    fn try_wait(&mut self) -> io::Result<Option<ExitReport>>;

    /// Blocks until the child finishes.
    fn wait(&mut self) -> io::Result<ExitReport>;

    /// Sends `signal` to the child's process group.
    fn signal(&mut self, signal: Signal) -> io::Result<()>;
}

/// Starts service processes.
pub trait ProcessSpawner: Send + Sync {
    /// Starts `command` for `role`.
    fn spawn(
        &self,
        role: ServiceRole,
        command: &ServiceCommand,
    ) -> Result<Box<dyn ServiceProcess>, SpawnError>;
}

/// Spawns real child processes, each leading its own process group.
#[derive(Debug, Clone, Default)]
pub struct SystemSpawner {
    working_dir: Option<PathBuf>,
}

impl SystemSpawner {
    /// Builds a spawner running children in `working_dir`, or in the
    /// launcher's directory when unset.
    #[must_use]
    pub const fn new(working_dir: Option<PathBuf>) -> Self {
        Self { working_dir }
    }
}

impl ProcessSpawner for SystemSpawner {
    fn spawn(
        &self,
        role: ServiceRole,
        command: &ServiceCommand,
    ) -> Result<Box<dyn ServiceProcess>, SpawnError> {
        let mut process = Command::new(command.program());
        // Each child leads its own group so signals can be relayed to it and
        // its descendants with `killpg`. The bot keeps the launcher's stdin
        // but is not the terminal's foreground group: a bot reading from an
        // interactive TTY (`docker run -it`) is stopped with `SIGTTIN`.
        process
            .args(command.args())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);
        match role {
            ServiceRole::Api => process.stdin(Stdio::null()),
            ServiceRole::Bot => process.stdin(Stdio::inherit()),
        };
        if let Some(dir) = &self.working_dir {
            process.current_dir(dir);
        }
        let child = process.spawn().map_err(|source| SpawnError {
            role,
            program: command.program().to_owned(),
            source,
        })?;
        Ok(Box::new(SystemProcess { child }))
    }
}

struct SystemProcess {
    child: Child,
}

impl ServiceProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitReport>> {
        Ok(self.child.try_wait()?.map(ExitReport::from_status))
    }

    fn wait(&mut self) -> io::Result<ExitReport> {
        self.child.wait().map(ExitReport::from_status)
    }

    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        signal_group(self.child.id(), signal)
    }
}

/// Sends `signal` to the process group led by `pid`.
pub(crate) fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    killpg(Pid::from_raw(raw), signal).map_err(io::Error::from)
}

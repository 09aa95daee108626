//! Runs the launch sequence: the API in the background, the readiness gate,
//! the bot in the foreground, then cleanup of whatever is still running.

use std::fmt;
use std::io;
use std::sync::Arc;

use nix::sys::signal::Signal;
use serde::Serialize;
use tracing::{info, warn};

use tandem_config::{Config, RuntimePaths};

use crate::health::{LaunchReporter, StructuredLaunchReporter};

use super::errors::LaunchError;
use super::exit::ExitReport;
use super::readiness::{ReadinessGate, ReadinessOutcome, Sleeper, ThreadSleeper};
use super::reaper::{OrphanReaper, SystemReaper};
use super::signals::{SignalRelay, SignalTargets, SystemSignalRelay};
use super::spawner::{ProcessSpawner, ServiceProcess, ServiceRole, SystemSpawner};
use super::status::StatusFile;
use super::{POLL_INTERVAL, PROCESS_TARGET};

/// Lifecycle stages of the launcher, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStage {
    /// Nothing has been started yet.
    NotStarted,
    /// The API is being started.
    ApiStarting,
    /// The readiness gate is in progress.
    Waiting,
    /// The bot is running in the foreground.
    BotRunning,
    /// The launcher is about to exit.
    Terminated,
}

impl LaunchStage {
    /// Stable label used in logs and the status snapshot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ApiStarting => "api_starting",
            Self::Waiting => "waiting",
            Self::BotRunning => "bot_running",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What became of the API by the time the launcher exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReport {
    /// The API could not be started; the bot ran regardless.
    SpawnFailed {
        /// Rendered spawn error.
        message: String,
    },
    /// The API exited on its own.
    Exited {
        /// API process id.
        pid: u32,
        /// How it finished.
        exit: ExitReport,
    },
    /// The launcher stopped the API.
    Stopped {
        /// API process id.
        pid: u32,
        /// How it finished, when it could be reaped.
        exit: Option<ExitReport>,
    },
    /// The API was still running and was left alone.
    LeftRunning {
        /// API process id.
        pid: u32,
    },
}

/// Summary of a completed launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Final state of the API.
    pub api: ApiReport,
    /// Result of the readiness gate.
    pub readiness: ReadinessOutcome,
    /// How the bot finished.
    pub bot: ExitReport,
    /// Termination signal received during the launch, if any.
    pub signal: Option<i32>,
}

impl LaunchOutcome {
    /// Exit code of the launcher: the bot's, by shell conventions.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.bot.exit_code()
    }
}

/// Process-level collaborators: spawning, signals, waiting, and reaping.
pub(crate) struct ProcessControl<P, R, S, O> {
    pub(crate) spawner: P,
    pub(crate) relay: R,
    pub(crate) sleeper: S,
    pub(crate) reaper: O,
}

/// Reporting and runtime artefacts.
pub(crate) struct ServiceDeps {
    pub(crate) reporter: Arc<dyn LaunchReporter>,
    pub(crate) runtime: Option<RuntimePaths>,
}

/// Collaborators required to run a launch.
pub(crate) struct LaunchPlan<P, R, S, O> {
    pub(crate) config: Config,
    pub(crate) gate: ReadinessGate,
    pub(crate) process: ProcessControl<P, R, S, O>,
    pub(crate) services: ServiceDeps,
}

/// Runs the launcher using the production collaborators.
pub fn run_launcher(config: &Config) -> Result<LaunchOutcome, LaunchError> {
    let gate = ReadinessGate::from_config(config)?;
    let runtime = match RuntimePaths::from_config(config) {
        Ok(paths) => Some(paths),
        Err(error) => {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "status snapshot disabled"
            );
            None
        }
    };
    let plan = LaunchPlan {
        config: config.clone(),
        gate,
        process: ProcessControl {
            spawner: SystemSpawner::new(config.working_dir.clone()),
            relay: SystemSignalRelay,
            sleeper: ThreadSleeper,
            reaper: SystemReaper::install(),
        },
        services: ServiceDeps {
            reporter: Arc::new(StructuredLaunchReporter::new()),
            runtime,
        },
    };
    run_launcher_with(plan)
}

/// Runs the launcher with injected collaborators.
pub(crate) fn run_launcher_with<P, R, S, O>(
    plan: LaunchPlan<P, R, S, O>,
) -> Result<LaunchOutcome, LaunchError>
where
    P: ProcessSpawner,
    R: SignalRelay,
    S: Sleeper,
    O: OrphanReaper,
{
    let LaunchPlan {
        config,
        gate,
        process,
        services,
    } = plan;
    let ProcessControl {
        spawner,
        relay,
        sleeper,
        reaper,
    } = process;
    let ServiceDeps { reporter, runtime } = services;

    info!(
        target: PROCESS_TARGET,
        api = %config.api_command,
        bot = %config.bot_command,
        readiness = %config.readiness,
        link_lifecycles = config.link_lifecycles,
        "starting launcher"
    );
    let targets = SignalTargets::default();
    let relay_handle = relay.start(targets.clone())?;
    let supervisor = Supervisor {
        config: &config,
        sleeper: &sleeper,
        reaper: &reaper,
        reporter: reporter.as_ref(),
        targets,
        status: runtime.map(|paths| StatusFile::new(&paths, std::process::id())),
    };
    if let Some(status) = &supervisor.status {
        info!(
            target: PROCESS_TARGET,
            file = %status.path().display(),
            "publishing status snapshot"
        );
    }

    supervisor.enter(LaunchStage::NotStarted, None, None);
    supervisor.enter(LaunchStage::ApiStarting, None, None);
    let mut api = supervisor.spawn_api(&spawner);
    supervisor.enter(LaunchStage::Waiting, api.pid(), None);
    let readiness = gate.await_ready(api.process_mut(), &sleeper);
    supervisor.reporter.readiness_resolved(&readiness);
    if let ReadinessOutcome::ApiExited { exit } = &readiness {
        supervisor.api_exited(&mut api, exit.clone());
    }

    if config.require_ready && !readiness.is_ready() {
        supervisor.settle_api(&mut api, true);
        supervisor.enter(LaunchStage::Terminated, None, None);
        relay_handle.stop();
        return Err(LaunchError::NotReady { outcome: readiness });
    }

    if let Some(signal) = supervisor.targets.received() {
        info!(
            target: PROCESS_TARGET,
            signal,
            "signal received before the bot started; not starting it"
        );
        let api_report = supervisor.settle_api(&mut api, true);
        supervisor.enter(LaunchStage::Terminated, None, None);
        relay_handle.stop();
        return Ok(LaunchOutcome {
            api: api_report,
            readiness,
            bot: ExitReport::NotStarted { signal },
            signal: Some(signal),
        });
    }

    let bot = supervisor.run_bot(&spawner, &mut api)?;
    let stop_api = config.link_lifecycles || supervisor.targets.received().is_some();
    let api_report = supervisor.settle_api(&mut api, stop_api);
    supervisor.enter(LaunchStage::Terminated, None, None);
    relay_handle.stop();

    let outcome = LaunchOutcome {
        api: api_report,
        readiness,
        bot,
        signal: supervisor.targets.received(),
    };
    info!(
        target: PROCESS_TARGET,
        exit_code = outcome.exit_code(),
        "launcher finished"
    );
    Ok(outcome)
}

/// The API process while it runs, and its report once it no longer does.
enum ApiSlot {
    Running(Box<dyn ServiceProcess>),
    Finished(ApiReport),
}

impl ApiSlot {
    fn pid(&self) -> Option<u32> {
        match self {
            Self::Running(process) => Some(process.id()),
            Self::Finished(_) => None,
        }
    }

    fn process_mut(&mut self) -> Option<&mut dyn ServiceProcess> {
        match self {
            Self::Running(process) => Some(process.as_mut()),
            Self::Finished(_) => None,
        }
    }
}

struct Supervisor<'a, S> {
    config: &'a Config,
    sleeper: &'a S,
    reaper: &'a dyn OrphanReaper,
    reporter: &'a dyn LaunchReporter,
    targets: SignalTargets,
    status: Option<StatusFile>,
}

impl<S: Sleeper> Supervisor<'_, S> {
    fn enter(&self, stage: LaunchStage, api_pid: Option<u32>, bot_pid: Option<u32>) {
        self.reporter.stage_entered(stage);
        if let Some(status) = &self.status {
            status.record(stage, api_pid, bot_pid);
        }
    }

    /// A failed spawn is logged and the launch carries on without the API.
    fn spawn_api(&self, spawner: &dyn ProcessSpawner) -> ApiSlot {
        match spawner.spawn(ServiceRole::Api, &self.config.api_command) {
            Ok(process) => {
                let pid = process.id();
                self.targets.register(ServiceRole::Api, pid);
                self.reporter.service_spawned(ServiceRole::Api, pid);
                ApiSlot::Running(process)
            }
            Err(error) => {
                self.reporter.service_spawn_failed(&error);
                ApiSlot::Finished(ApiReport::SpawnFailed {
                    message: error.to_string(),
                })
            }
        }
    }

    fn api_exited(&self, api: &mut ApiSlot, exit: ExitReport) {
        if let ApiSlot::Running(process) = api {
            let pid = process.id();
            self.targets.unregister(ServiceRole::Api);
            self.reporter.service_exited(ServiceRole::Api, &exit);
            *api = ApiSlot::Finished(ApiReport::Exited { pid, exit });
        }
    }

    /// Stops the API when `stop` is set, otherwise leaves it running, and
    /// returns its final report.
    fn settle_api(&self, api: &mut ApiSlot, stop: bool) -> ApiReport {
        let report = match api {
            ApiSlot::Finished(report) => return report.clone(),
            ApiSlot::Running(process) if stop => {
                let pid = process.id();
                let exit = match self.stop_service(ServiceRole::Api, process.as_mut()) {
                    Ok(exit) => {
                        self.reporter.service_exited(ServiceRole::Api, &exit);
                        Some(exit)
                    }
                    Err(error) => {
                        warn!(
                            target: PROCESS_TARGET,
                            pid,
                            error = %error,
                            "failed to reap api process"
                        );
                        None
                    }
                };
                self.targets.unregister(ServiceRole::Api);
                ApiReport::Stopped { pid, exit }
            }
            ApiSlot::Running(process) => {
                let pid = process.id();
                self.reporter.service_left_running(ServiceRole::Api, pid);
                ApiReport::LeftRunning { pid }
            }
        };
        *api = ApiSlot::Finished(report.clone());
        report
    }

    fn run_bot(
        &self,
        spawner: &dyn ProcessSpawner,
        api: &mut ApiSlot,
    ) -> Result<ExitReport, LaunchError> {
        let mut bot = match spawner.spawn(ServiceRole::Bot, &self.config.bot_command) {
            Ok(bot) => bot,
            Err(error) => {
                self.reporter.service_spawn_failed(&error);
                self.enter(LaunchStage::BotRunning, api.pid(), None);
                return Ok(ExitReport::from_spawn_error(&error));
            }
        };
        let pid = bot.id();
        self.targets.register(ServiceRole::Bot, pid);
        self.reporter.service_spawned(ServiceRole::Bot, pid);
        // A signal relayed between the spawn and the registration above
        // missed the bot.
        if let Some(raw) = self.targets.received()
            && let Ok(signal) = Signal::try_from(raw)
            && let Err(error) = bot.signal(signal)
        {
            warn!(
                target: PROCESS_TARGET,
                pid,
                error = %error,
                "failed to forward signal to bot"
            );
        }
        self.enter(LaunchStage::BotRunning, api.pid(), Some(pid));

        let exit = if self.config.link_lifecycles || self.reaper.adopts_orphans() {
            self.supervise(bot.as_mut(), api)?
        } else {
            bot.wait()
                .map_err(|source| LaunchError::WaitBot { pid, source })?
        };
        self.targets.unregister(ServiceRole::Bot);
        self.reporter.service_exited(ServiceRole::Bot, &exit);
        Ok(exit)
    }

    /// Polls both children and reaps adopted orphans until the bot exits.
    /// With linked lifecycles an API exit brings the bot down; otherwise it is
    /// only recorded.
    fn supervise(
        &self,
        bot: &mut dyn ServiceProcess,
        api: &mut ApiSlot,
    ) -> Result<ExitReport, LaunchError> {
        let pid = bot.id();
        let wait_error = move |source| LaunchError::WaitBot { pid, source };
        loop {
            if let Some(exit) = bot.try_wait().map_err(wait_error)? {
                return Ok(exit);
            }
            if let Some(exit) = poll_api(api) {
                self.api_exited(api, exit);
                if self.config.link_lifecycles {
                    warn!(target: PROCESS_TARGET, "api exited; stopping the bot");
                    return self.stop_service(ServiceRole::Bot, bot).map_err(wait_error);
                }
            }
            let owned: Vec<u32> = api.pid().into_iter().chain([pid]).collect();
            self.reaper.reap(&owned);
            self.sleeper.sleep(POLL_INTERVAL);
        }
    }

    /// Sends `SIGTERM` to the child's group, waits up to the shutdown grace,
    /// then sends `SIGKILL` and reaps the child.
    fn stop_service(
        &self,
        role: ServiceRole,
        process: &mut dyn ServiceProcess,
    ) -> io::Result<ExitReport> {
        if let Some(exit) = process.try_wait()? {
            return Ok(exit);
        }
        let pid = process.id();
        let grace = self.config.shutdown_grace();
        info!(
            target: PROCESS_TARGET,
            service = %role,
            pid,
            grace_ms = grace.as_millis(),
            "stopping service"
        );
        if let Err(error) = process.signal(Signal::SIGTERM) {
            warn!(
                target: PROCESS_TARGET,
                service = %role,
                pid,
                error = %error,
                "failed to send SIGTERM"
            );
        }
        let polls = grace.as_millis().div_ceil(POLL_INTERVAL.as_millis());
        for _ in 0..polls {
            if let Some(exit) = process.try_wait()? {
                return Ok(exit);
            }
            self.sleeper.sleep(POLL_INTERVAL);
        }
        if let Some(exit) = process.try_wait()? {
            return Ok(exit);
        }
        warn!(
            target: PROCESS_TARGET,
            service = %role,
            pid,
            "service outlived the shutdown grace; sending SIGKILL"
        );
        if let Err(error) = process.signal(Signal::SIGKILL) {
            warn!(
                target: PROCESS_TARGET,
                service = %role,
                pid,
                error = %error,
                "failed to send SIGKILL"
            );
        }
        process.wait()
    }
}

fn poll_api(api: &mut ApiSlot) -> Option<ExitReport> {
    let process = api.process_mut()?;
    match process.try_wait() {
        Ok(exit) => exit,
        Err(error) => {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "failed to poll api process"
            );
            None
        }
    }
}

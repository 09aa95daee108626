//! Builder running the launch sequence against the fakes.

use std::sync::Arc;

use tandem_config::{Config, RuntimePaths};

use super::journal::{Journal, JournalSleeper};
use super::reaper::RecordingReaper;
use super::relay::QuietRelay;
use super::reporter::RecordingLaunchReporter;
use super::spawner::{FakeBehaviour, ScriptedSpawner};
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_launcher_with};
use crate::process::readiness::ReadinessGate;
use crate::process::signals::SignalRelay;
use crate::process::{LaunchError, LaunchOutcome};

/// One launch with scripted children and recorded side effects.
pub struct LaunchHarness {
    pub journal: Journal,
    pub reporter: Arc<RecordingLaunchReporter>,
    pub config: Config,
    pub api: FakeBehaviour,
    pub bot: FakeBehaviour,
    pub gate: Option<ReadinessGate>,
    pub runtime: Option<RuntimePaths>,
    pub reaper: RecordingReaper,
}

impl Default for LaunchHarness {
    fn default() -> Self {
        Self {
            journal: Journal::default(),
            reporter: Arc::new(RecordingLaunchReporter::default()),
            config: Config::default(),
            api: FakeBehaviour::RunsUntilSignalled,
            bot: FakeBehaviour::exits_with(0),
            gate: None,
            runtime: None,
            reaper: RecordingReaper::default(),
        }
    }
}

impl LaunchHarness {
    pub fn run(&mut self) -> Result<LaunchOutcome, LaunchError> {
        self.run_with(QuietRelay)
    }

    pub fn run_with<R: SignalRelay>(&mut self, relay: R) -> Result<LaunchOutcome, LaunchError> {
        let gate = match self.gate.take() {
            Some(gate) => gate,
            None => ReadinessGate::from_config(&self.config).expect("readiness gate builds"),
        };
        let plan = LaunchPlan {
            config: self.config.clone(),
            gate,
            process: ProcessControl {
                spawner: ScriptedSpawner::new(
                    self.journal.clone(),
                    self.api.clone(),
                    self.bot.clone(),
                ),
                relay,
                sleeper: JournalSleeper::new(self.journal.clone()),
                reaper: self.reaper.clone(),
            },
            services: ServiceDeps {
                reporter: self.reporter.clone(),
                runtime: self.runtime.clone(),
            },
        };
        run_launcher_with(plan)
    }
}

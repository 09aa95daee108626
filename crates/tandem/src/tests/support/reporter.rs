//! Test double for [`LaunchReporter`] that records events for assertions.

use std::sync::Mutex;

use crate::health::LaunchReporter;
use crate::process::{ExitReport, LaunchStage, ReadinessOutcome, ServiceRole, SpawnError};

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Stage(LaunchStage),
    Spawned(ServiceRole),
    SpawnFailed(ServiceRole),
    Readiness(ReadinessOutcome),
    Exited(ServiceRole, ExitReport),
    LeftRunning(ServiceRole),
}

/// Records launch events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLaunchReporter {
    events: Mutex<Vec<LaunchEvent>>,
}

impl RecordingLaunchReporter {
    #[must_use]
    pub fn events(&self) -> Vec<LaunchEvent> {
        self.events
            .lock()
            .expect("launch reporter mutex poisoned")
            .clone()
    }

    #[must_use]
    pub fn stages(&self) -> Vec<LaunchStage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LaunchEvent::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: LaunchEvent) {
        self.events
            .lock()
            .expect("launch reporter mutex poisoned")
            .push(event);
    }
}

impl LaunchReporter for RecordingLaunchReporter {
    fn stage_entered(&self, stage: LaunchStage) {
        self.record(LaunchEvent::Stage(stage));
    }

    fn service_spawned(&self, role: ServiceRole, _pid: u32) {
        self.record(LaunchEvent::Spawned(role));
    }

    fn service_spawn_failed(&self, error: &SpawnError) {
        self.record(LaunchEvent::SpawnFailed(error.role));
    }

    fn readiness_resolved(&self, outcome: &ReadinessOutcome) {
        self.record(LaunchEvent::Readiness(outcome.clone()));
    }

    fn service_exited(&self, role: ServiceRole, exit: &ExitReport) {
        self.record(LaunchEvent::Exited(role, exit.clone()));
    }

    fn service_left_running(&self, role: ServiceRole, _pid: u32) {
        self.record(LaunchEvent::LeftRunning(role));
    }
}

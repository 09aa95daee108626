//! Structured reporting of launcher lifecycle events.

use std::sync::Arc;

use crate::process::{ExitReport, LaunchStage, ReadinessOutcome, ServiceRole, SpawnError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LaunchReporter: Send + Sync {
    /// Invoked when the launcher moves to `stage`.
    fn stage_entered(&self, stage: LaunchStage);

    /// Invoked after a service process starts.
    fn service_spawned(&self, role: ServiceRole, pid: u32);

    /// Invoked when a service process cannot be started.
    fn service_spawn_failed(&self, error: &SpawnError);

    /// Invoked once the readiness gate has decided.
    fn readiness_resolved(&self, outcome: &ReadinessOutcome);

    /// Invoked after a service process has been reaped.
    fn service_exited(&self, role: ServiceRole, exit: &ExitReport);

    /// Invoked when the launcher exits without stopping a service.
    fn service_left_running(&self, role: ServiceRole, pid: u32);
}

impl<T> LaunchReporter for Arc<T>
where
    T: LaunchReporter + ?Sized,
{
    fn stage_entered(&self, stage: LaunchStage) {
        (**self).stage_entered(stage);
    }

    fn service_spawned(&self, role: ServiceRole, pid: u32) {
        (**self).service_spawned(role, pid);
    }

    fn service_spawn_failed(&self, error: &SpawnError) {
        (**self).service_spawn_failed(error);
    }

    fn readiness_resolved(&self, outcome: &ReadinessOutcome) {
        (**self).readiness_resolved(outcome);
    }

    fn service_exited(&self, role: ServiceRole, exit: &ExitReport) {
        (**self).service_exited(role, exit);
    }

    fn service_left_running(&self, role: ServiceRole, pid: u32) {
        (**self).service_left_running(role, pid);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLaunchReporter;

impl StructuredLaunchReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LaunchReporter for StructuredLaunchReporter {
    fn stage_entered(&self, stage: LaunchStage) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stage_entered",
            stage = %stage,
            "launcher stage changed"
        );
    }

    fn service_spawned(&self, role: ServiceRole, pid: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "service_spawned",
            service = %role,
            pid,
            "service started"
        );
    }

    fn service_spawn_failed(&self, error: &SpawnError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "service_spawn_failed",
            service = %error.role,
            program = %error.program,
            error = %error.source,
            "service failed to start"
        );
    }

    fn readiness_resolved(&self, outcome: &ReadinessOutcome) {
        if outcome.is_ready() {
            tracing::info!(
                target: HEALTH_TARGET,
                event = "readiness_resolved",
                outcome = %outcome,
                "api readiness resolved"
            );
        } else {
            tracing::warn!(
                target: HEALTH_TARGET,
                event = "readiness_resolved",
                outcome = %outcome,
                "api did not become ready"
            );
        }
    }

    fn service_exited(&self, role: ServiceRole, exit: &ExitReport) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "service_exited",
            service = %role,
            exit = %exit,
            exit_code = exit.exit_code(),
            "service exited"
        );
    }

    fn service_left_running(&self, role: ServiceRole, pid: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "service_left_running",
            service = %role,
            pid,
            "service left running"
        );
    }
}

//! Launcher for an HTTP API and a bot sharing one container.
//!
//! The launcher starts the API command in the background, waits for it to
//! become ready, then runs the bot command in the foreground and exits with
//! the bot's status. Readiness is a fixed startup delay unless a TCP or HTTP
//! probe is configured.
//!
//! Children run in their own process groups. Termination signals received by
//! the launcher are relayed to both groups, and a signal that arrives before
//! the bot has started prevents it from starting at all. When lifecycles are
//! linked, the first child to exit brings the other one down; otherwise the
//! API is left running once the bot exits, as a plain shell script would.
//!
//! Lifecycle events are reported through [`LaunchReporter`] and written to a
//! status snapshot in the runtime directory while the launcher runs.

mod health;
mod process;
mod telemetry;

use std::ffi::OsString;
use std::fmt::Display;
use std::io::Write;
use std::process::ExitCode;

use tandem_config::Config;

pub use health::{LaunchReporter, StructuredLaunchReporter};
pub use process::{
    ApiReport, ExitReport, LaunchError, LaunchOutcome, LaunchStage, ProbeError, ReadinessOutcome,
    RelayError, ServiceRole, SpawnError, run_launcher,
};
pub use telemetry::TelemetryError;

/// Runs the launcher for the given arguments and returns its exit code.
///
/// `args[0]` is the binary name. Configuration and telemetry failures are
/// written to `stderr`; help and version requests print to stdout and
/// succeed.
pub fn run<I, T>(args: I, stderr: &mut impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = match Config::resolve_from_iter(args) {
        Ok(config) => config,
        Err(error) => {
            if let Some(cli_error) = error.cli_error() {
                cli_error.print().ok();
                return ExitCode::from(u8::try_from(cli_error.exit_code()).unwrap_or(2));
            }
            report(stderr, &error);
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = telemetry::initialise(&config) {
        report(stderr, &error);
        return ExitCode::FAILURE;
    }
    match run_launcher(&config) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(error) => {
            tracing::error!(
                target: process::PROCESS_TARGET,
                error = %error,
                "launcher failed"
            );
            report(stderr, &error);
            ExitCode::FAILURE
        }
    }
}

fn report(stderr: &mut impl Write, error: &dyn Display) {
    writeln!(stderr, "tandem: {error}").ok();
}

#[cfg(test)]
mod tests;

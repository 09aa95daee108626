//! Relays termination signals received by the launcher to its children.
//!
//! Children run in their own process groups, so a terminal or container
//! runtime signalling the launcher does not reach them directly. The relay
//! thread forwards each signal to every registered group and remembers that
//! a signal arrived, which stops the launch from starting the bot.

use std::io;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use nix::sys::signal::Signal;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::PROCESS_TARGET;
use super::spawner::{ServiceRole, signal_group};

/// Signals forwarded to the children.
pub const RELAYED_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Errors reported while starting the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The relay thread could not be started.
    #[error("failed to start signal relay thread: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Process groups currently eligible to receive relayed signals.
#[derive(Debug, Clone, Default)]
pub struct SignalTargets {
    inner: Arc<Targets>,
}

#[derive(Debug, Default)]
struct Targets {
    groups: Mutex<Vec<(ServiceRole, u32)>>,
    received: AtomicI32,
}

impl SignalTargets {
    /// Adds the process group led by `pid`.
    pub fn register(&self, role: ServiceRole, pid: u32) {
        let mut groups = self.lock();
        groups.retain(|(existing, _)| *existing != role);
        groups.push((role, pid));
    }

    /// Removes `role` once its process has been reaped.
    pub fn unregister(&self, role: ServiceRole) {
        self.lock().retain(|(existing, _)| *existing != role);
    }

    /// The most recent signal received, if any.
    #[must_use]
    pub fn received(&self) -> Option<i32> {
        match self.inner.received.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }

    /// Records `signal` and forwards it to every registered group.
    pub fn relay(&self, signal: i32) {
        self.inner.received.store(signal, Ordering::SeqCst);
        let Ok(forwarded) = Signal::try_from(signal) else {
            warn!(target: PROCESS_TARGET, signal, "ignoring unknown signal");
            return;
        };
        for (role, pid) in self.lock().iter() {
            match signal_group(*pid, forwarded) {
                Ok(()) => info!(
                    target: PROCESS_TARGET,
                    service = %role,
                    pid,
                    signal = %forwarded,
                    "signal forwarded"
                ),
                Err(error) => debug!(
                    target: PROCESS_TARGET,
                    service = %role,
                    pid,
                    error = %error,
                    "signal not forwarded"
                ),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ServiceRole, u32)>> {
        self.inner
            .groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Source of termination signals for the launcher.
pub trait SignalRelay: Send + Sync {
    /// Starts forwarding signals to `targets` until the handle is stopped.
    fn start(&self, targets: SignalTargets) -> Result<RelayHandle, RelayError>;
}

/// Relay backed by process signal handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignalRelay;

impl SignalRelay for SystemSignalRelay {
    fn start(&self, targets: SignalTargets) -> Result<RelayHandle, RelayError> {
        let mut signals =
            Signals::new(RELAYED_SIGNALS).map_err(|source| RelayError::Install { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("tandem-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(target: PROCESS_TARGET, signal, "termination signal received");
                    targets.relay(signal);
                }
            })
            .map_err(|source| RelayError::Thread { source })?;
        Ok(RelayHandle {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

/// Stops the relay thread when dropped.
#[derive(Debug, Default)]
pub struct RelayHandle {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl RelayHandle {
    /// Stops relaying and joins the relay thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: PROCESS_TARGET, "signal relay thread panicked");
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

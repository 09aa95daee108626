//! The gate between starting the API and starting the bot.
//!
//! By default the gate sleeps for a fixed delay and assumes the API is up.
//! The probe modes instead poll the API port (TCP connect or HTTP health
//! route) for a bounded number of attempts, giving up early if the API
//! process exits.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use tandem_config::{Config, ReadinessMode};

use super::PROCESS_TARGET;
use super::exit::ExitReport;
use super::spawner::ServiceProcess;

/// Blocks the calling thread; injected so tests can observe waits.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// A single readiness check against the API.
#[cfg_attr(test, mockall::automock)]
pub trait Probe: Send + Sync {
    /// Returns true when the API answered.
    fn check(&self) -> bool;

    /// Describes the probed endpoint for logs.
    fn target(&self) -> String;
}

/// Succeeds once a TCP connection to the API port is accepted.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    /// Probes `127.0.0.1:port`, bounding each connection attempt by `timeout`.
    #[must_use]
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            timeout,
        }
    }
}

impl Probe for TcpProbe {
    fn check(&self) -> bool {
        match TcpStream::connect_timeout(&self.address, self.timeout) {
            Ok(_) => true,
            Err(error) => {
                debug!(
                    target: PROCESS_TARGET,
                    address = %self.address,
                    error = %error,
                    "tcp probe failed"
                );
                false
            }
        }
    }

    fn target(&self) -> String {
        self.address.to_string()
    }
}

/// Errors raised while building a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http probe client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Succeeds once the API health route answers with a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpProbe {
    /// Probes `http://127.0.0.1:{port}{path}`.
    pub fn new(port: u16, path: &str, timeout: Duration) -> Result<Self, ProbeError> {
        // The health route is on loopback; proxy settings from the
        // environment must not apply to it.
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: format!("http://{}:{port}{path}", Ipv4Addr::LOCALHOST),
        })
    }
}

impl Probe for HttpProbe {
    fn check(&self) -> bool {
        match self.client.get(&self.url).send() {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(
                    target: PROCESS_TARGET,
                    url = %self.url,
                    status = %response.status(),
                    "http probe answered without success"
                );
                false
            }
            Err(error) => {
                debug!(
                    target: PROCESS_TARGET,
                    url = %self.url,
                    error = %error,
                    "http probe failed"
                );
                false
            }
        }
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// Result of the readiness gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The fixed delay elapsed; readiness is assumed, not verified.
    Assumed {
        /// Time spent waiting.
        waited: Duration,
    },
    /// A probe succeeded.
    Confirmed {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every probe attempt failed.
    TimedOut {
        /// Attempts made.
        attempts: u32,
    },
    /// The API exited while it was being probed.
    ApiExited {
        /// How the API finished.
        exit: ExitReport,
    },
}

impl ReadinessOutcome {
    /// True when the bot may start under `require_ready`.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Assumed { .. } | Self::Confirmed { .. })
    }
}

impl fmt::Display for ReadinessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assumed { waited } => {
                write!(f, "assumed ready after {}ms", waited.as_millis())
            }
            Self::Confirmed { attempts } => write!(f, "confirmed after {attempts} attempt(s)"),
            Self::TimedOut { attempts } => {
                write!(f, "not ready after {attempts} attempt(s)")
            }
            Self::ApiExited { exit } => write!(f, "api exited during readiness ({exit})"),
        }
    }
}

/// Decides when the bot may start.
pub enum ReadinessGate {
    /// Sleep for `delay`.
    FixedDelay {
        /// Time to wait.
        delay: Duration,
    },
    /// Poll `probe` up to `attempts` times, `interval` apart.
    Probing {
        /// Readiness check.
        probe: Box<dyn Probe>,
        /// Pause between attempts.
        interval: Duration,
        /// Maximum number of attempts.
        attempts: u32,
    },
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedDelay { delay } => f.debug_struct("FixedDelay").field("delay", delay).finish(),
            Self::Probing {
                probe,
                interval,
                attempts,
            } => f
                .debug_struct("Probing")
                .field("target", &probe.target())
                .field("interval", interval)
                .field("attempts", attempts)
                .finish(),
        }
    }
}

impl ReadinessGate {
    /// Builds the gate selected by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ProbeError> {
        let probe: Box<dyn Probe> = match config.readiness {
            ReadinessMode::Delay => return Ok(Self::fixed_delay(config.startup_delay())),
            ReadinessMode::Tcp => Box::new(TcpProbe::new(config.api_port, config.probe_interval())),
            ReadinessMode::Http => Box::new(HttpProbe::new(
                config.api_port,
                &config.health_path,
                config.probe_interval(),
            )?),
        };
        Ok(Self::probing(
            probe,
            config.probe_interval(),
            config.readiness_timeout(),
        ))
    }

    /// Gate that sleeps for `delay`.
    #[must_use]
    pub const fn fixed_delay(delay: Duration) -> Self {
        Self::FixedDelay { delay }
    }

    /// Gate that polls `probe` every `interval` for at most `timeout`.
    ///
    /// At least one attempt is always made.
    #[must_use]
    pub fn probing(probe: Box<dyn Probe>, interval: Duration, timeout: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            u32::try_from(timeout.as_millis().div_ceil(interval.as_millis()))
                .unwrap_or(u32::MAX)
                .max(1)
        };
        Self::Probing {
            probe,
            interval,
            attempts,
        }
    }

    /// Waits until the API is considered ready.
    ///
    /// `api` is the running API process, when one was started; probing stops
    /// as soon as it exits.
    pub fn await_ready(
        &self,
        mut api: Option<&mut dyn ServiceProcess>,
        sleeper: &dyn Sleeper,
    ) -> ReadinessOutcome {
        let (probe, interval, attempts) = match self {
            Self::FixedDelay { delay } => {
                sleeper.sleep(*delay);
                return ReadinessOutcome::Assumed { waited: *delay };
            }
            Self::Probing {
                probe,
                interval,
                attempts,
            } => (probe, *interval, *attempts),
        };
        debug!(
            target: PROCESS_TARGET,
            probe = %probe.target(),
            attempts,
            interval_ms = interval.as_millis(),
            "probing api readiness"
        );
        for attempt in 1..=attempts {
            if let Some(process) = api.as_mut() {
                match process.try_wait() {
                    Ok(Some(exit)) => return ReadinessOutcome::ApiExited { exit },
                    Ok(None) => {}
                    Err(error) => warn!(
                        target: PROCESS_TARGET,
                        error = %error,
                        "failed to poll api process"
                    ),
                }
            }
            if probe.check() {
                return ReadinessOutcome::Confirmed { attempts: attempt };
            }
            if attempt < attempts {
                sleeper.sleep(interval);
            }
        }
        ReadinessOutcome::TimedOut { attempts }
    }
}

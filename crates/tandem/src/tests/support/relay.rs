//! Signal relays that never touch process-wide signal handlers.

use crate::process::signals::{RelayHandle, SignalRelay, SignalTargets};
use crate::process::RelayError;

/// Relay that never observes a signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietRelay;

impl SignalRelay for QuietRelay {
    fn start(&self, _targets: SignalTargets) -> Result<RelayHandle, RelayError> {
        Ok(RelayHandle::default())
    }
}

/// Relay that reports `signal` as received before anything is spawned.
#[derive(Debug, Clone, Copy)]
pub struct PresignalledRelay {
    pub signal: i32,
}

impl SignalRelay for PresignalledRelay {
    fn start(&self, targets: SignalTargets) -> Result<RelayHandle, RelayError> {
        targets.relay(self.signal);
        Ok(RelayHandle::default())
    }
}

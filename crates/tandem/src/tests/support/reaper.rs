//! Orphan reaper that records its calls instead of waiting on children.

use std::sync::{Arc, Mutex};

use crate::process::reaper::OrphanReaper;

/// Records the owned pids passed on every reaping pass.
#[derive(Debug, Clone, Default)]
pub struct RecordingReaper {
    adopts: bool,
    passes: Arc<Mutex<Vec<Vec<u32>>>>,
}

impl RecordingReaper {
    /// A reaper standing in for a launcher that adopts orphans.
    pub fn adopting() -> Self {
        Self {
            adopts: true,
            passes: Arc::default(),
        }
    }

    #[must_use]
    pub fn passes(&self) -> Vec<Vec<u32>> {
        self.passes.lock().expect("reaper mutex poisoned").clone()
    }
}

impl OrphanReaper for RecordingReaper {
    fn adopts_orphans(&self) -> bool {
        self.adopts
    }

    fn reap(&self, owned: &[u32]) -> usize {
        self.passes
            .lock()
            .expect("reaper mutex poisoned")
            .push(owned.to_vec());
        0
    }
}

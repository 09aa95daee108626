//! Ordered record of the side effects observed by the fakes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::process::ServiceRole;
use crate::process::readiness::Sleeper;

/// A single observable side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A service spawn was attempted.
    Spawn(ServiceRole),
    /// The launcher slept.
    Sleep(Duration),
    /// A signal was sent to a service's group.
    Signal(ServiceRole, Signal),
    /// The launcher blocked waiting for a service.
    Wait(ServiceRole),
}

/// Shared, ordered list of steps.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Journal {
    pub fn push(&self, step: Step) {
        self.steps.lock().expect("journal mutex poisoned").push(step);
    }

    #[must_use]
    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().expect("journal mutex poisoned").clone()
    }

    /// Steps other than sleeps issued while polling.
    #[must_use]
    pub fn milestones(&self, poll: Duration) -> Vec<Step> {
        self.steps()
            .into_iter()
            .filter(|step| *step != Step::Sleep(poll))
            .collect()
    }

    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.steps()
            .into_iter()
            .filter_map(|step| match step {
                Step::Sleep(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }
}

/// Sleeper that records instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct JournalSleeper {
    journal: Journal,
}

impl JournalSleeper {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Sleeper for JournalSleeper {
    fn sleep(&self, duration: Duration) {
        self.journal.push(Step::Sleep(duration));
    }
}

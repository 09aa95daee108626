//! Test doubles for the launcher's process, signal, and reporting seams.

mod harness;
mod journal;
mod reaper;
mod relay;
mod reporter;
mod spawner;

pub use harness::LaunchHarness;
pub use journal::Step;
pub use reaper::RecordingReaper;
pub use relay::PresignalledRelay;
pub use reporter::LaunchEvent;
pub use spawner::{FAKE_API_PID, FAKE_BOT_PID, FakeBehaviour};

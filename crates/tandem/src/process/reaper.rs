//! Reaping of descendants orphaned while the launcher supervises.
//!
//! Inside a container the launcher is process 1, so every process whose
//! parent dies is reparented to it. Elsewhere on Linux it registers as a child
//! subreaper and adopts its own orphaned descendants. Either way those
//! processes become zombies unless the launcher collects them, which it does
//! on each supervision poll without disturbing the API or the bot.

use tracing::{debug, warn};

use super::PROCESS_TARGET;

/// Collects exited processes adopted by the launcher.
pub(crate) trait OrphanReaper: Send + Sync {
    /// True when orphaned descendants are reparented to the launcher.
    fn adopts_orphans(&self) -> bool;

    /// Reaps every exited child whose pid is not in `owned`, returning how
    /// many were collected.
    fn reap(&self, owned: &[u32]) -> usize;
}

/// Reaper backed by `waitid`/`waitpid` on the launcher's own children.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SystemReaper {
    adopts: bool,
}

impl SystemReaper {
    /// Registers the launcher as a child subreaper where supported.
    pub(crate) fn install() -> Self {
        let adopts = std::process::id() == 1 || become_subreaper();
        debug!(target: PROCESS_TARGET, adopts, "orphan reaping configured");
        Self { adopts }
    }
}

impl OrphanReaper for SystemReaper {
    fn adopts_orphans(&self) -> bool {
        self.adopts
    }

    fn reap(&self, owned: &[u32]) -> usize {
        if self.adopts { reap_exited(owned) } else { 0 }
    }
}

#[cfg(target_os = "linux")]
fn become_subreaper() -> bool {
    match nix::sys::prctl::set_child_subreaper(true) {
        Ok(()) => true,
        Err(errno) => {
            warn!(
                target: PROCESS_TARGET,
                error = %errno,
                "failed to register as child subreaper"
            );
            false
        }
    }
}

#[cfg(not(target_os = "linux"))]
const fn become_subreaper() -> bool {
    false
}

/// Peeks at the next exited child without reaping it, then reaps it unless it
/// is one of `owned`. Stops at the first owned child so its status stays
/// available to whoever waits on it.
#[cfg(target_os = "linux")]
fn reap_exited(owned: &[u32]) -> usize {
    use nix::errno::Errno;
    use nix::sys::wait::{Id, WaitPidFlag, waitid, waitpid};

    let peek = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    let mut reaped = 0;
    loop {
        let pid = match waitid(Id::All, peek) {
            Ok(status) => match status.pid() {
                Some(pid) => pid,
                None => break,
            },
            Err(Errno::ECHILD) => break,
            Err(errno) => {
                warn!(target: PROCESS_TARGET, error = %errno, "failed to poll for orphans");
                break;
            }
        };
        if u32::try_from(pid.as_raw()).is_ok_and(|raw| owned.contains(&raw)) {
            break;
        }
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => {
                debug!(
                    target: PROCESS_TARGET,
                    pid = pid.as_raw(),
                    status = ?status,
                    "reaped orphaned process"
                );
                reaped += 1;
            }
            Err(errno) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid = pid.as_raw(),
                    error = %errno,
                    "failed to reap orphaned process"
                );
                break;
            }
        }
    }
    reaped
}

#[cfg(not(target_os = "linux"))]
const fn reap_exited(_owned: &[u32]) -> usize {
    0
}

//! Scripted stand-ins for the API and bot processes.

use std::io;

use nix::sys::signal::Signal;

use tandem_config::ServiceCommand;

use super::journal::{Journal, Step};
use crate::process::ExitReport;
use crate::process::spawner::{ProcessSpawner, ServiceProcess, ServiceRole};
use crate::process::SpawnError;

pub const FAKE_API_PID: u32 = 4100;
pub const FAKE_BOT_PID: u32 = 4200;

/// How a fake process behaves once spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Reports `exit` once it has been polled `polls` times; blocking waits
    /// return it immediately.
    ExitsAfter { polls: usize, exit: ExitReport },
    /// Runs until it receives any signal.
    RunsUntilSignalled,
    /// Survives `SIGTERM` and only dies on `SIGKILL`.
    IgnoresTerm,
    /// Spawning fails with this error kind.
    FailsToSpawn(io::ErrorKind),
}

impl FakeBehaviour {
    pub fn exits_with(code: i32) -> Self {
        Self::ExitsAfter {
            polls: 0,
            exit: ExitReport::Code(code),
        }
    }
}

/// Spawner handing out fake processes and journalling every attempt.
#[derive(Debug, Clone)]
pub struct ScriptedSpawner {
    journal: Journal,
    api: FakeBehaviour,
    bot: FakeBehaviour,
}

impl ScriptedSpawner {
    pub fn new(journal: Journal, api: FakeBehaviour, bot: FakeBehaviour) -> Self {
        Self { journal, api, bot }
    }
}

impl ProcessSpawner for ScriptedSpawner {
    fn spawn(
        &self,
        role: ServiceRole,
        command: &ServiceCommand,
    ) -> Result<Box<dyn ServiceProcess>, SpawnError> {
        self.journal.push(Step::Spawn(role));
        let (behaviour, pid) = match role {
            ServiceRole::Api => (self.api.clone(), FAKE_API_PID),
            ServiceRole::Bot => (self.bot.clone(), FAKE_BOT_PID),
        };
        if let FakeBehaviour::FailsToSpawn(kind) = behaviour {
            return Err(SpawnError {
                role,
                program: command.program().to_owned(),
                source: io::Error::from(kind),
            });
        }
        Ok(Box::new(FakeProcess {
            role,
            pid,
            behaviour,
            polls: 0,
            signalled: None,
            journal: self.journal.clone(),
        }))
    }
}

struct FakeProcess {
    role: ServiceRole,
    pid: u32,
    behaviour: FakeBehaviour,
    polls: usize,
    signalled: Option<Signal>,
    journal: Journal,
}

impl FakeProcess {
    fn finished(&self) -> Option<ExitReport> {
        if let Some(signal) = self.signalled {
            return Some(ExitReport::Signal(signal as i32));
        }
        match &self.behaviour {
            FakeBehaviour::ExitsAfter { polls, exit } if self.polls >= *polls => Some(exit.clone()),
            _ => None,
        }
    }
}

impl ServiceProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitReport>> {
        let finished = self.finished();
        if finished.is_none() {
            self.polls += 1;
        }
        Ok(finished)
    }

    fn wait(&mut self) -> io::Result<ExitReport> {
        self.journal.push(Step::Wait(self.role));
        if let Some(exit) = self.finished() {
            return Ok(exit);
        }
        match &self.behaviour {
            FakeBehaviour::ExitsAfter { exit, .. } => Ok(exit.clone()),
            _ => Err(io::Error::other("fake process would block forever")),
        }
    }

    fn signal(&mut self, signal: Signal) -> io::Result<()> {
        self.journal.push(Step::Signal(self.role, signal));
        let ignored = self.behaviour == FakeBehaviour::IgnoresTerm && signal != Signal::SIGKILL;
        if !ignored {
            self.signalled = Some(signal);
        }
        Ok(())
    }
}

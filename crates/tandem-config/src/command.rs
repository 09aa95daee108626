//! Shell-style service command lines.
//!
//! Commands are written the way they would appear in a startup script
//! (`uvicorn miniapp.api:app --port 8000`) and split with POSIX shell quoting
//! rules. No shell is involved when the command is later spawned, so
//! expansions and redirections are not supported.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Program and argument vector for one supervised service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceCommand {
    program: String,
    args: Vec<String>,
}

/// Errors produced when parsing a [`ServiceCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceCommandParseError {
    /// The command line contained no program.
    #[error("command line is empty")]
    Empty,
    /// The command line had unbalanced quotes or a dangling escape.
    #[error("command line '{0}' has unbalanced quoting")]
    Quoting(String),
}

impl ServiceCommand {
    /// Builds a command from a program and its arguments.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program looked up on `PATH` when spawning.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl FromStr for ServiceCommand {
    type Err = ServiceCommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words =
            shlex::split(line).ok_or_else(|| ServiceCommandParseError::Quoting(line.to_owned()))?;
        let mut words = words.into_iter();
        let program = words.next().ok_or(ServiceCommandParseError::Empty)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

impl TryFrom<String> for ServiceCommand {
    type Error = ServiceCommandParseError;

    fn try_from(line: String) -> Result<Self, Self::Error> {
        line.parse()
    }
}

impl From<ServiceCommand> for String {
    fn from(command: ServiceCommand) -> Self {
        command.to_string()
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_word(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_word(f, arg)?;
        }
        Ok(())
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    match shlex::try_quote(word) {
        Ok(quoted) => f.write_str(&quoted),
        // Words containing NUL cannot be quoted; show them verbatim.
        Err(_) => f.write_str(word),
    }
}

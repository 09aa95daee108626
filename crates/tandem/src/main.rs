//! Command-line entry point for the `tandem` launcher.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    tandem::run(std::env::args_os(), &mut io::stderr())
}

//! Entry point for the `warden` binary.
//!
//! Delegates to [`warden::run`], which loads configuration, installs
//! telemetry, executes the selected mode and maps the result to an exit
//! status.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    warden::run(std::env::args_os(), &mut stdout, &mut stderr)
}

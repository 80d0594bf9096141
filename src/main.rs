//! FileVault CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`; all configuration and
//! service setup lives in the CLI module. Errors go to stderr with a
//! non-zero exit.

use filevault::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

//! Entry point for the `cep` command-line runner.

mod commands;
mod patterns;

use clap::Parser;
use observability_deps::tracing::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = commands::run::Config::parse();
    match commands::run::command(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(source) => {
            error!(%source, "cep exited with an error");
            ExitCode::FAILURE
        }
    }
}

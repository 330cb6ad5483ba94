// src/bin/envsync.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use envsync::cli::{Cli, dispatcher};

/// The main entry point of the `envsync` application.
/// It sets up logging, parses arguments, dispatches to the matching handler,
/// and performs centralized error handling.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    dispatcher::dispatch(cli.args)
}

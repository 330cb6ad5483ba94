// src/cli/handlers/approval.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::env;
use std::path::PathBuf;

use crate::{
    cli::handlers::commons::{self, Session},
    core::actions::CommandActions,
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
struct ApprovalArgs {
    /// The `.envrc`, or a path inside its directory. Defaults to the current directory.
    path: Option<PathBuf>,
}

/// `envsync allow [PATH]`
pub fn handle_allow(args: Vec<String>) -> Result<()> {
    let path = target_path(commons::parse_args(&args))?;
    let session = Session::open()?;

    CommandActions::new(session.machine()).allow(&path)?;
    session.machine().settle()?;
    println!("{} {}", "Allowed".green().bold(), path.display());
    Ok(())
}

/// `envsync deny [PATH]`
pub fn handle_deny(args: Vec<String>) -> Result<()> {
    let path = target_path(commons::parse_args(&args))?;
    let session = Session::open()?;

    CommandActions::new(session.machine()).deny(&path)?;
    session.machine().settle()?;
    println!("{} {}", "Denied".yellow().bold(), path.display());
    Ok(())
}

fn target_path(args: ApprovalArgs) -> Result<PathBuf> {
    match args.path {
        Some(path) => Ok(path),
        None => env::current_dir().context("Failed to read the current directory"),
    }
}

// src/cli/handlers/load.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::{
    cli::handlers::commons::{self, Session},
    models::Overlay,
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Switches to each path in turn and prints what the final context changed."
)]
struct LoadArgs {
    /// Files or directories, visited in order.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let load_args: LoadArgs = commons::parse_args(&args);
    let session = Session::open()?;

    session.load(&load_args.paths)?;
    print_changes(&session.changes());
    Ok(())
}

fn print_changes(changes: &Overlay) {
    if changes.is_empty() {
        println!("{}", "No variables changed.".yellow());
        return;
    }
    for (key, value) in changes.iter() {
        match value {
            Some(value) => println!("  {} {}={}", "+".green(), key.cyan(), value),
            None => println!("  {} {}", "-".red(), key.cyan()),
        }
    }
}

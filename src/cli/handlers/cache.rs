// src/cli/handlers/cache.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::{
    cli::handlers::commons::{self, Session},
    core::{actions::CommandActions, cache::EnvironmentCache},
};

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the cached overlays.")]
struct ListArgs {}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Drops every cached overlay, then reloads PATH if given."
)]
struct ClearArgs {
    path: Option<PathBuf>,
}

/// `envsync cache`
pub fn handle_list(args: Vec<String>) -> Result<()> {
    let _: ListArgs = commons::parse_args(&args);
    let settings = commons::load_settings()?;
    let cache = EnvironmentCache::new(settings.cache_root()?);

    println!("  {:<15} {}", "Cache Root:".blue(), cache.root().display());
    let entries = cache
        .entries()
        .with_context(|| format!("Failed to read cache at {}", cache.root().display()))?;

    if entries.is_empty() {
        println!("{}", "\nNo cached overlays.".yellow());
        return Ok(());
    }

    println!();
    for entry in entries {
        println!(
            "  {:<50} {}",
            entry.file_name.cyan(),
            format!("{} variables", entry.variables).dimmed()
        );
    }
    Ok(())
}

/// `envsync clear [PATH]`
pub fn handle_clear(args: Vec<String>) -> Result<()> {
    let clear_args: ClearArgs = commons::parse_args(&args);
    let session = Session::open()?;

    CommandActions::new(session.machine()).clear(clear_args.path.as_deref())?;
    session.machine().settle()?;
    println!("{}", "Cache cleared.".green().bold());
    Ok(())
}

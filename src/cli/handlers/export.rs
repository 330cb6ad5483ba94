// src/cli/handlers/export.rs

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::{
    cli::handlers::commons::{self, Session},
    models::Overlay,
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Prints the overlay of a path.")]
struct ExportArgs {
    /// A file or directory inside the context to export.
    path: PathBuf,

    #[arg(long, short, value_enum, default_value_t = Format::Shell)]
    format: Format,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    /// POSIX `export`/`unset` lines, for `eval`.
    Shell,
    /// A JSON object; removed variables are `null`.
    Json,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let export_args: ExportArgs = commons::parse_args(&args);
    let session = Session::open()?;

    session.load(&[&export_args.path])?;
    let changes = session.changes();

    let rendered = match export_args.format {
        Format::Shell => render_shell(&changes),
        Format::Json => {
            serde_json::to_string_pretty(&changes).context("Failed to serialize the overlay")?
        }
    };
    println!("{rendered}");
    Ok(())
}

/// Renders `overlay` as a script for POSIX shells.
fn render_shell(overlay: &Overlay) -> String {
    let mut script = String::new();
    for (key, value) in overlay.iter() {
        match value {
            Some(value) => {
                let escaped_value = value.replace('\'', "'\\''");
                script.push_str(&format!("export {key}='{escaped_value}'\n"));
            }
            None => script.push_str(&format!("unset {key}\n")),
        }
    }
    script
}

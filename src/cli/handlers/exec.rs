// src/cli/handlers/exec.rs

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;

use crate::{
    cli::handlers::commons::{self, Session},
    system::executor,
};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Runs a command inside the environment of a path."
)]
struct ExecArgs {
    /// A file or directory inside the context to load.
    path: PathBuf,

    /// The command and its arguments, after `--`.
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let exec_args: ExecArgs = commons::parse_args(&args);
    let (program, program_args) = exec_args
        .command
        .split_first()
        .ok_or_else(|| anyhow!("No command given after '--'."))?;

    let session = Session::open()?;
    session.load(&[&exec_args.path])?;

    // The child inherits the environment the session just applied.
    log::debug!("Executing {:?} {:?}", program, program_args);
    let status = Command::new(program)
        .args(program_args)
        .status()
        .with_context(|| format!("Failed to execute '{program}'"))?;
    drop(session);

    let code = executor::exit_code(status);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_must_follow_separator() {
        let parsed = ExecArgs::try_parse_from(["proj", "--", "make", "-j4"]).unwrap();
        assert_eq!(parsed.command, vec!["make", "-j4"]);
        assert!(ExecArgs::try_parse_from(["proj"]).is_err());
    }
}

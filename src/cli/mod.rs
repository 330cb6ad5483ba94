// src/cli/mod.rs

use clap::Parser;

pub mod dispatcher;
pub mod handlers;

const HELP_TEMPLATE: &str = "\
<title>envsync</title> {version}
Keeps a process environment in sync with per-directory <hl>.envrc</hl> overlays.

<title>USAGE</title>
  envsync <cmd><COMMAND></cmd> [ARGS...]

<title>COMMANDS</title>
  <group>Loading</group>
    <cmd>load</cmd> <dim><PATH>...</dim>               Switch to each path in turn and print what changed
    <cmd>export</cmd> <dim><PATH> [--format F]</dim>   Print the overlay of PATH as shell or JSON
    <cmd>exec</cmd> <dim><PATH> -- <CMD>...</dim>      Run CMD inside the environment of PATH

  <group>Approval</group>
    <cmd>allow</cmd> <dim>[PATH]</dim>                 Approve the .envrc governing PATH
    <cmd>deny</cmd> <dim>[PATH]</dim>                  Revoke approval of the .envrc governing PATH

  <group>Cache</group>
    <cmd>cache</cmd>                        List cached overlays
    <err>clear</err> <dim>[PATH]</dim>                 Drop every cached overlay, then reload PATH

<title>ENVIRONMENT</title>
  <hi>ENVSYNC_CONFIG</hi>   Alternative settings file
  <hi>RUST_LOG</hi>         Log verbosity (e.g. debug)
";

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let hi = if use_colors { "\x1b[1m" } else { "" }; // Bold
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let err = if use_colors { "\x1b[91m" } else { "" }; // Bright Red (destructive)
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = HELP_TEMPLATE
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<hi>", hi)
        .replace("</hi>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<err>", err)
        .replace("</err>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    // clap wants a 'static template; this runs once per process.
    Box::leak(formatted_string.into_boxed_str())
}

/// envsync: per-directory environments for long-lived processes.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The command followed by its own arguments; each handler parses the rest.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub args: Vec<String>,
}

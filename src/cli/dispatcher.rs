// src/cli/dispatcher.rs

use anyhow::{Result, anyhow};

use crate::cli::handlers;

/// A command, its aliases and its handler. Handlers receive the arguments that
/// follow the command name and parse them themselves.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "load",
        aliases: &["cd"],
        handler: handlers::load::handle,
    },
    CommandDefinition {
        name: "export",
        aliases: &[],
        handler: handlers::export::handle,
    },
    CommandDefinition {
        name: "exec",
        aliases: &["run"],
        handler: handlers::exec::handle,
    },
    CommandDefinition {
        name: "allow",
        aliases: &["permit"],
        handler: handlers::approval::handle_allow,
    },
    CommandDefinition {
        name: "deny",
        aliases: &["block"],
        handler: handlers::approval::handle_deny,
    },
    CommandDefinition {
        name: "clear",
        aliases: &[],
        handler: handlers::cache::handle_clear,
    },
    CommandDefinition {
        name: "cache",
        aliases: &["ls"],
        handler: handlers::cache::handle_list,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `envsync <command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let Some(name) = args.next() else {
        return Err(anyhow!(
            "No command given. Run 'envsync --help' for the list of commands."
        ));
    };

    let command = find_command(&name).ok_or_else(|| {
        anyhow!("Unknown command '{name}'. Run 'envsync --help' for the list of commands.")
    })?;
    (command.handler)(args.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_their_command() {
        assert_eq!(find_command("cd").map(|c| c.name), Some("load"));
        assert_eq!(find_command("permit").map(|c| c.name), Some("allow"));
        assert!(find_command("nope").is_none());
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for cmd in COMMAND_REGISTRY {
            assert!(seen.insert(cmd.name), "duplicate '{}'", cmd.name);
            for alias in cmd.aliases {
                assert!(seen.insert(*alias), "duplicate '{alias}'");
            }
        }
    }

    #[test]
    fn test_dispatch_rejects_unknown_and_missing_commands() {
        assert!(dispatch(vec![]).is_err());
        assert!(dispatch(vec!["frobnicate".to_string()]).is_err());
    }
}

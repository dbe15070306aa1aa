//! Input line to plugin command resolution.

use plughost_types::HostError;

use crate::parser::parse_line;
use crate::registry::Registry;

/// A line that matched a registered command with an accepted argument count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub owner: String,
    pub name: String,
    pub args: Vec<String>,
}

/// Match `line` against the registered commands.
///
/// Argument counts are checked here so the owning plugin is never invoked
/// with a count outside its declared range.
pub fn resolve(registry: &Registry, line: &str) -> Result<ResolvedCommand, HostError> {
    let parsed =
        parse_line(line).ok_or_else(|| HostError::UnknownCommand(line.trim().to_string()))?;

    let command = registry
        .lookup_command(&parsed.command)
        .ok_or_else(|| HostError::UnknownCommand(parsed.command.clone()))?;

    let given = parsed.args.len();
    if !command.spec.accepts(given) {
        return Err(HostError::ArgumentCount {
            command: parsed.command,
            min: command.spec.min_args,
            max: command.spec.max_args,
            given,
            synopsis: command.spec.help.synopsis.clone(),
        });
    }

    Ok(ResolvedCommand {
        owner: command.owner.clone(),
        name: parsed.command,
        args: parsed.args,
    })
}

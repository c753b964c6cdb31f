//! Static command-name table and console tab completion.

/// One top-level command known to the completion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Command name as typed.
    pub name: &'static str,
    /// Whether the command may be issued from the local console.
    pub allow_console: bool,
}

const fn cmd(name: &'static str, allow_console: bool) -> CommandInfo {
    CommandInfo {
        name,
        allow_console,
    }
}

/// Top-level commands of the world server.
pub static DEFAULT_COMMANDS: &[CommandInfo] = &[
    cmd("account", true),
    cmd("announce", true),
    cmd("ban", true),
    cmd("baninfo", true),
    cmd("banlist", true),
    cmd("character", true),
    cmd("commands", false),
    cmd("gm", false),
    cmd("go", false),
    cmd("gobject", false),
    cmd("guild", true),
    cmd("help", true),
    cmd("instance", true),
    cmd("kick", true),
    cmd("learn", false),
    cmd("lookup", true),
    cmd("modify", false),
    cmd("notify", true),
    cmd("npc", false),
    cmd("pdump", true),
    cmd("quest", false),
    cmd("reload", true),
    cmd("reset", true),
    cmd("send", true),
    cmd("server", true),
    cmd("tele", true),
    cmd("unban", true),
    cmd("wp", false),
];

/// Console-allowed commands starting with `partial`, case-sensitive, in table order.
///
/// ```
/// use worldvisor::{complete_command, DEFAULT_COMMANDS};
///
/// assert_eq!(complete_command(DEFAULT_COMMANDS, "ban"), vec!["ban", "baninfo", "banlist"]);
/// assert!(complete_command(DEFAULT_COMMANDS, "gm").is_empty());
/// ```
pub fn complete_command(table: &[CommandInfo], partial: &str) -> Vec<&'static str> {
    table
        .iter()
        .filter(|c| c.allow_console && c.name.starts_with(partial))
        .map(|c| c.name)
        .collect()
}

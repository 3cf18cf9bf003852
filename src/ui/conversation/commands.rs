use std::str::FromStr;

use crate::events::Locale;
use crate::persona::Country;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Switch jurisdiction (Kenya, Uganda, Tanzania)
    Country,
    /// Switch language (en, sw)
    Lang,
    /// Attach an image or PDF
    Attach,
    /// Remove the pending attachment
    Detach,
    /// Send one of the suggested questions
    Chip,
    /// Read a reply aloud
    Speak,
    /// Dictate a message
    Mic,
    /// Build a share link for a reply
    Share,
    /// Save the conversation to disk
    Export,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn country_target(&self) -> Option<Country> {
        if self.command != SlashCommand::Country {
            return None;
        }
        Country::find(self.argument()?)
    }

    /// Requested locale; `None` with no argument means toggle.
    pub fn locale_target(&self) -> Option<Locale> {
        if self.command != SlashCommand::Lang {
            return None;
        }
        Locale::from_str(&self.argument()?.trim().to_lowercase()).ok()
    }

    /// 1-based index argument converted to 0-based
    pub fn index_argument(&self) -> Option<usize> {
        self.argument()?.trim().parse::<usize>().ok()?.checked_sub(1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Country => "switch jurisdiction (Kenya, Uganda, Tanzania)",
            SlashCommand::Lang => "switch language (en, sw); no argument toggles",
            SlashCommand::Attach => "attach an image or PDF up to 5MB",
            SlashCommand::Detach => "remove the pending attachment",
            SlashCommand::Chip => "send suggested question <n>",
            SlashCommand::Speak => "read reply <n> aloud (latest by default); again to stop",
            SlashCommand::Mic => "dictate a message",
            SlashCommand::Share => "build a WhatsApp share link for reply <n>",
            SlashCommand::Export => "save the conversation as JSON and HTML",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a reply is pending.
    pub fn available_while_loading(self) -> bool {
        !matches!(self, SlashCommand::Country | SlashCommand::Chip)
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim_start().strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next()?.to_lowercase();
    let argument = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "c" | "nchi" => Some(SlashCommand::Country),
        "l" | "language" | "lugha" => Some(SlashCommand::Lang),
        "file" | "upload" => Some(SlashCommand::Attach),
        "s" | "say" => Some(SlashCommand::Speak),
        "voice" => Some(SlashCommand::Mic),
        "save" => Some(SlashCommand::Export),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }
    help.push_str("Aliases: /q for /bye, /c for /country, /l for /lang, /s for /speak, /save for /export");
    help
}

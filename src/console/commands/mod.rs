//! # Console Commands
//!
//! Slash commands typed at the console, implemented with the command
//! pattern: each handler declares which names it answers to and turns
//! arguments plus context into transcript lines. The registry tries the
//! handlers in order and the first match wins.

use anyhow::Result;
use crossterm::style::Color;

use super::theme::Theme;
use crate::collapse::{CollapseRegistry, PatternStore};
use crate::history::SharedHistory;

pub mod basic;
pub mod collapse;
pub mod inspect;

pub use basic::{ClearCommand, ExitCommand, HelpCommand, StatsCommand};
pub use collapse::CollapseCommand;
pub use inspect::{ListCommand, ViewCommand};

/// Default `/list` count
pub const DEFAULT_LIST_COUNT: usize = 5;

/// Side effect a command asks the console to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    ClearTranscript,
    Exit,
}

/// Result of running a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub lines: Vec<String>,
    pub action: Option<ConsoleAction>,
}

impl CommandOutcome {
    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            action: None,
        }
    }

    pub fn line(line: impl Into<String>) -> Self {
        Self::lines(vec![line.into()])
    }

    pub fn with_action(mut self, action: ConsoleAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Where the proxy listens and forwards, shown by `/stats` and the banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    pub port: u16,
    pub upstream: String,
}

/// Everything a command may read or change
pub struct CommandContext<'a> {
    pub history: &'a SharedHistory,
    pub collapse: &'a mut CollapseRegistry,
    pub pattern_store: Option<&'a PatternStore>,
    pub info: &'a ProxyInfo,
    pub theme: Theme,
}

/// Trait for console slash commands
pub trait ConsoleCommand: Send + Sync {
    /// Check if this command answers to `name` (already lowercased, no slash)
    fn can_handle(&self, name: &str) -> bool;

    /// Run the command with its whitespace-split arguments
    fn execute(&self, args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome>;

    /// Get command name for debugging
    fn name(&self) -> &'static str;
}

/// A line of console input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput<'a> {
    Empty,
    Text(&'a str),
    Command { name: String, args: Vec<&'a str> },
}

impl<'a> ParsedInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ParsedInput::Empty;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return ParsedInput::Text(trimmed);
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        ParsedInput::Command {
            name,
            args: parts.collect(),
        }
    }
}

/// Registry of all console commands
pub struct CommandRegistry {
    commands: Vec<Box<dyn ConsoleCommand>>,
}

impl CommandRegistry {
    /// Registry holding every built-in command
    pub fn new() -> Self {
        let commands: Vec<Box<dyn ConsoleCommand>> = vec![
            Box::new(HelpCommand),
            Box::new(ClearCommand),
            Box::new(StatsCommand),
            Box::new(ListCommand),
            Box::new(ViewCommand),
            Box::new(CollapseCommand),
            Box::new(ExitCommand),
        ];
        Self { commands }
    }

    pub fn register(&mut self, command: Box<dyn ConsoleCommand>) {
        self.commands.push(command);
    }

    pub fn find(&self, name: &str) -> Option<&dyn ConsoleCommand> {
        self.commands
            .iter()
            .find(|command| command.can_handle(name))
            .map(|command| command.as_ref())
    }

    /// Run a parsed command; failures become transcript lines
    pub fn dispatch(
        &self,
        name: &str,
        args: &[&str],
        context: &mut CommandContext<'_>,
    ) -> CommandOutcome {
        let theme = context.theme;
        let Some(command) = self.find(name) else {
            return CommandOutcome::line(theme.error(&format!(
                "Unknown command: /{name}. Type /help for available commands."
            )));
        };

        tracing::debug!("Executing {} with {:?}", command.name(), args);
        match command.execute(args, context) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("{} failed: {:#}", command.name(), e);
                CommandOutcome::line(format!("❌ {}", theme.error(&format!("{e:#}"))))
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `↳ /cmd - description` help line
pub(crate) fn usage_line(theme: &Theme, command: &str, description: &str) -> String {
    format!("↳ {} - {description}", theme.paint(command, Color::Green))
}

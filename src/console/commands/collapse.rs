//! `/collapse` and its subcommands

use anyhow::Result;
use crossterm::style::Color;

use super::{usage_line, CommandContext, CommandOutcome, ConsoleCommand};
use crate::console::theme::Theme;

/// Collapse command handler (for /collapse [add|remove|clear] ...)
///
/// Every change is written through to the pattern file when one is
/// configured. A failed save is reported but the in-memory change stays.
pub struct CollapseCommand;

impl CollapseCommand {
    fn show(context: &CommandContext<'_>) -> Vec<String> {
        let theme = &context.theme;
        let patterns = context.collapse.list();
        let mut lines = Vec::new();

        if patterns.is_empty() {
            lines.push("📋 No collapsed response patterns configured.".to_string());
        } else {
            lines.push("📋 Current collapsed response patterns:".to_string());
            lines.push(String::new());
            for (index, pattern) in patterns.iter().enumerate() {
                lines.push(format!(
                    "{} {}",
                    theme.dim(&format!("{}.", index + 1)),
                    theme.paint(pattern, Color::Yellow)
                ));
            }
        }

        lines.push(String::new());
        lines.push(usage_line(theme, "/collapse add <pattern>", "Add a pattern"));
        if !patterns.is_empty() {
            lines.push(usage_line(theme, "/collapse remove <pattern>", "Remove a pattern"));
        }
        lines.push(usage_line(theme, "/collapse clear", "Clear all patterns"));
        lines
    }

    fn unknown_subcommand(theme: &Theme, subcommand: &str) -> Vec<String> {
        vec![
            format!(
                "❌ {} {}",
                theme.error("Unknown subcommand:"),
                theme.paint(subcommand, Color::Yellow)
            ),
            String::new(),
            theme.dim("Available subcommands:"),
            usage_line(theme, "/collapse", "Show current patterns"),
            usage_line(theme, "/collapse add <pattern>", "Add pattern"),
            usage_line(theme, "/collapse remove <pattern>", "Remove pattern"),
            usage_line(theme, "/collapse clear", "Clear all patterns"),
            String::new(),
            theme.dim("Pattern examples:"),
            format!("↳ {} - Exact match", theme.paint("/v1/models", Color::Yellow)),
            format!(
                "↳ {} - Any URL ending in /models",
                theme.paint("*/models", Color::Yellow)
            ),
            format!(
                "↳ {} - Prefix match (matches /v1/users/me, etc.)",
                theme.paint("/v1/users/*", Color::Yellow)
            ),
        ]
    }

    /// Write the current list through; returns a warning line on failure
    fn persist(context: &CommandContext<'_>) -> Option<String> {
        let store = context.pattern_store?;
        match store.save(context.collapse.list().as_slice()) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Could not save collapse patterns: {}", e);
                Some(format!(
                    "⚠️  {}",
                    context
                        .theme
                        .paint(&format!("Could not save patterns: {e}"), Color::Yellow)
                ))
            }
        }
    }

    fn changed(context: &CommandContext<'_>, message: String) -> CommandOutcome {
        let mut lines = vec![message];
        lines.extend(Self::persist(context));
        CommandOutcome::lines(lines)
    }
}

impl ConsoleCommand for CollapseCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "collapse"
    }

    fn execute(&self, args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let theme = context.theme;
        let Some((subcommand, rest)) = args.split_first() else {
            return Ok(CommandOutcome::lines(Self::show(context)));
        };
        let subcommand = subcommand.to_ascii_lowercase();
        let pattern = rest.join(" ");

        let outcome = match subcommand.as_str() {
            "clear" => {
                context.collapse.clear();
                Self::changed(
                    context,
                    format!("✅ {}", theme.paint("Cleared all collapsed response patterns.", Color::Green)),
                )
            }
            "add" | "remove" if pattern.is_empty() => CommandOutcome::line(format!(
                "❌ {} Usage: {}",
                theme.error("Missing pattern."),
                theme.paint(&format!("/collapse {subcommand} <pattern>"), Color::Green)
            )),
            "add" => match context.collapse.add(&pattern) {
                Ok(true) => Self::changed(
                    context,
                    format!(
                        "✅ {} {}",
                        theme.paint("Added collapse pattern:", Color::Green),
                        theme.paint(&pattern, Color::Yellow)
                    ),
                ),
                Ok(false) => CommandOutcome::line(format!(
                    "⚠️  {} {}",
                    theme.paint("Pattern already exists:", Color::Yellow),
                    theme.paint(&pattern, Color::Yellow)
                )),
                Err(e) => CommandOutcome::line(format!(
                    "❌ {}",
                    theme.error(&format!("Invalid pattern: {e}"))
                )),
            },
            "remove" => {
                if context.collapse.remove(&pattern) {
                    Self::changed(
                        context,
                        format!(
                            "✅ {} {}",
                            theme.paint("Removed collapse pattern:", Color::Green),
                            theme.paint(&pattern, Color::Yellow)
                        ),
                    )
                } else {
                    CommandOutcome::line(format!(
                        "❌ {} {}",
                        theme.error("Pattern not found:"),
                        theme.paint(&pattern, Color::Yellow)
                    ))
                }
            }
            other => CommandOutcome::lines(Self::unknown_subcommand(&theme, other)),
        };
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "CollapseCommand"
    }
}

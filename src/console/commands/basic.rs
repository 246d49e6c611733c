//! `/help`, `/clear`, `/stats` and `/exit`

use anyhow::Result;
use crossterm::style::Color;
use std::sync::PoisonError;

use super::{usage_line, CommandContext, CommandOutcome, ConsoleAction, ConsoleCommand};

/// Help command handler (for /help)
pub struct HelpCommand;

impl ConsoleCommand for HelpCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "help" || name == "?"
    }

    fn execute(&self, _args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let theme = &context.theme;
        let mut lines = vec!["Available commands:".to_string(), String::new()];
        for (command, description) in [
            ("/help", "Show this help message"),
            ("/clear", "Clear the transcript"),
            ("/stats", "Show proxy statistics"),
            ("/list [n]", "List the last n requests (default: 5)"),
            ("/view [n]", "View the nth most recent request in full (default: latest)"),
            ("/view #<id>", "View a request by its record id"),
            ("/collapse", "Show collapse patterns"),
            ("/collapse add <pattern>", "Collapse response bodies for matching URLs"),
            ("/collapse remove <pattern>", "Stop collapsing matching URLs"),
            ("/collapse clear", "Remove all collapse patterns"),
            ("/exit", "Stop the proxy and exit"),
        ] {
            lines.push(usage_line(theme, command, description));
        }
        lines.push(String::new());
        lines.push("All traffic through the proxy is captured automatically.".to_string());
        lines.push("Use Ctrl+C to exit at any time.".to_string());
        Ok(CommandOutcome::lines(lines))
    }

    fn name(&self) -> &'static str {
        "HelpCommand"
    }
}

/// Clear command handler (for /clear); history is left untouched
pub struct ClearCommand;

impl ConsoleCommand for ClearCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "clear"
    }

    fn execute(&self, _args: &[&str], _context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::default().with_action(ConsoleAction::ClearTranscript))
    }

    fn name(&self) -> &'static str {
        "ClearCommand"
    }
}

/// Stats command handler (for /stats)
pub struct StatsCommand;

impl ConsoleCommand for StatsCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "stats"
    }

    fn execute(&self, _args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let stats = context
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stats();
        let theme = &context.theme;
        let value = |v: String| theme.paint(&v, Color::Cyan);

        Ok(CommandOutcome::lines(vec![
            "📊 Proxy Statistics:".to_string(),
            String::new(),
            format!("↳ Total requests: {}", value(stats.total.to_string())),
            format!("↳ Completed: {}", value(stats.completed.to_string())),
            format!("↳ Errors: {}", value(stats.failed.to_string())),
            format!("↳ Pending: {}", value(stats.pending.to_string())),
            format!("↳ Success rate: {}", value(format!("{}%", stats.success_percent()))),
            String::new(),
            format!("↳ Proxy port: {}", value(context.info.port.to_string())),
            format!("↳ Forwarding to: {}", value(context.info.upstream.clone())),
            format!(
                "↳ History size: {}",
                value(format!("{}/{}", stats.total, stats.capacity))
            ),
        ]))
    }

    fn name(&self) -> &'static str {
        "StatsCommand"
    }
}

/// Exit command handler (for /exit and /quit)
pub struct ExitCommand;

impl ConsoleCommand for ExitCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "exit" || name == "quit"
    }

    fn execute(&self, _args: &[&str], _context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        Ok(CommandOutcome::line("👋 Shutting down...").with_action(ConsoleAction::Exit))
    }

    fn name(&self) -> &'static str {
        "ExitCommand"
    }
}

//! `/list` and `/view`: read-only history inspection

use anyhow::Result;
use std::sync::PoisonError;

use super::{CommandContext, CommandOutcome, ConsoleCommand, DEFAULT_LIST_COUNT};
use crate::console::render::{record_detail, record_summary};
use crate::events::RecordId;

/// List command handler (for /list [n])
pub struct ListCommand;

impl ConsoleCommand for ListCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "list" || name == "ls"
    }

    fn execute(&self, args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let theme = &context.theme;
        let count = match args.first() {
            None => DEFAULT_LIST_COUNT,
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Ok(CommandOutcome::line(format!(
                        "❌ {}",
                        theme.error("Invalid count. Please provide a positive number.")
                    )))
                }
            },
        };

        let history = context
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if history.is_empty() {
            return Ok(CommandOutcome::line("📋 No requests recorded yet."));
        }

        let recent = history.get_last(count);
        let plural = if recent.len() == 1 { "" } else { "s" };
        let mut lines = vec![format!("📋 Last {} request{plural}:", recent.len())];
        lines.extend(recent.iter().map(|record| record_summary(theme, record)));
        Ok(CommandOutcome::lines(lines))
    }

    fn name(&self) -> &'static str {
        "ListCommand"
    }
}

/// Which record `/view` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewTarget {
    /// 1-based position counted back from the most recent record
    Position(usize),
    /// Absolute record id, written `#id`
    Id(RecordId),
}

impl ViewTarget {
    fn parse(arg: Option<&&str>) -> Option<Self> {
        let Some(arg) = arg else {
            return Some(ViewTarget::Position(1));
        };
        if let Some(id) = arg.strip_prefix('#') {
            return id.parse().ok().map(|id| ViewTarget::Id(RecordId::new(id)));
        }
        match arg.parse() {
            Ok(n) if n > 0 => Some(ViewTarget::Position(n)),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            ViewTarget::Position(n) => n.to_string(),
            ViewTarget::Id(id) => id.to_string(),
        }
    }
}

/// View command handler (for /view [n] and /view #id)
///
/// Collapse patterns apply here just as in live output.
pub struct ViewCommand;

impl ConsoleCommand for ViewCommand {
    fn can_handle(&self, name: &str) -> bool {
        name == "view" || name == "show"
    }

    fn execute(&self, args: &[&str], context: &mut CommandContext<'_>) -> Result<CommandOutcome> {
        let theme = &context.theme;
        let Some(target) = ViewTarget::parse(args.first()) else {
            return Ok(CommandOutcome::line(format!(
                "❌ {}",
                theme.error("Invalid record index. Use /view [n] or /view #<id>.")
            )));
        };

        let history = context
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let record = match target {
            ViewTarget::Position(n) => history.get_by_index(n),
            ViewTarget::Id(id) => history.get_by_id(id),
        };
        let Some(record) = record else {
            return Ok(CommandOutcome::line(format!(
                "❌ {}",
                theme.error(&format!("No such record: {}", target.describe()))
            )));
        };

        let collapsed = context.collapse.matches(record.url());
        Ok(CommandOutcome::lines(record_detail(theme, record, collapsed)))
    }

    fn name(&self) -> &'static str {
        "ViewCommand"
    }
}

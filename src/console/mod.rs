//! # Command Console
//!
//! Interactive front end of the proxy. Captured traffic is rendered live
//! from the event bus while slash commands typed on stdin inspect history
//! and manage collapse patterns.
//!
//! ```text
//!   stdin lines ──▶ ParsedInput ──▶ CommandRegistry ──▶ CommandOutcome ─┐
//!                                                                        ├──▶ Transcript
//!   EventBus ──▶ EventReceiver ──▶ LiveRenderer ─────────────────────────┘
//! ```

use anyhow::Result;
use crossterm::style::Color;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod commands;
pub mod input;
pub mod live;
pub mod render;
pub mod theme;
pub mod transcript;

pub use commands::{
    CommandContext, CommandOutcome, CommandRegistry, ConsoleAction, ConsoleCommand, ParsedInput,
    ProxyInfo,
};
pub use input::stdin_lines;
pub use live::LiveRenderer;
pub use theme::Theme;
pub use transcript::{MemoryTranscript, TerminalTranscript, Transcript};

use crate::collapse::{CollapseRegistry, PatternStore};
use crate::events::{EventReceiver, LogEvent};
use crate::history::SharedHistory;

/// Where the console is in handling a line of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Idle,
    Parsing,
    Executing,
}

/// Whether the console loop keeps going after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Line-oriented console over a transcript
pub struct Console<T: Transcript> {
    transcript: T,
    history: SharedHistory,
    collapse: CollapseRegistry,
    pattern_store: Option<PatternStore>,
    registry: CommandRegistry,
    live: LiveRenderer,
    info: ProxyInfo,
    theme: Theme,
    state: ConsoleState,
}

impl<T: Transcript> Console<T> {
    pub fn new(
        transcript: T,
        history: SharedHistory,
        collapse: CollapseRegistry,
        info: ProxyInfo,
        theme: Theme,
    ) -> Self {
        Self {
            transcript,
            history,
            collapse,
            pattern_store: None,
            registry: CommandRegistry::new(),
            live: LiveRenderer::new(),
            info,
            theme,
            state: ConsoleState::Idle,
        }
    }

    /// Persist collapse pattern changes to `store`
    pub fn with_pattern_store(mut self, store: PatternStore) -> Self {
        self.pattern_store = Some(store);
        self
    }

    pub fn transcript(&self) -> &T {
        &self.transcript
    }

    pub fn collapse(&self) -> &CollapseRegistry {
        &self.collapse
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = self.transcript.append(line) {
            tracing::warn!("Failed to write console output: {}", e);
        }
    }

    /// Append lines that did not come from a command or an event
    pub fn print_lines(&mut self, lines: &[String]) {
        self.emit_all(lines);
    }

    fn emit_all(&mut self, lines: &[String]) {
        for line in lines {
            self.emit(line);
        }
    }

    pub fn print_banner(&mut self) {
        let theme = self.theme;
        let banner = vec![
            theme.heading("● tapline HTTP debugging proxy", Color::White),
            format!(
                "{}{}",
                theme.paint("↳", Color::Cyan),
                theme.dim(&format!(" proxy:    localhost:{}", self.info.port))
            ),
            format!(
                "{}{}",
                theme.paint("↳", Color::Cyan),
                theme.dim(&format!(" forward:  {}", self.info.upstream))
            ),
            String::new(),
            theme.dim("Type /help for available commands."),
        ];
        self.emit_all(&banner);
    }

    /// Handle one line typed by the user
    pub fn handle_line(&mut self, line: &str) -> LoopControl {
        self.state = ConsoleState::Parsing;
        let parsed = ParsedInput::parse(line);
        if parsed == ParsedInput::Empty {
            self.state = ConsoleState::Idle;
            return LoopControl::Continue;
        }

        let theme = self.theme;
        self.emit_all(&[
            String::new(),
            theme.paint(&format!("> {}", line.trim()), Color::Yellow),
            theme.heading("=== System ===", Color::Magenta),
        ]);

        let outcome = match parsed {
            ParsedInput::Command { name, args } => {
                self.state = ConsoleState::Executing;
                let mut context = CommandContext {
                    history: &self.history,
                    collapse: &mut self.collapse,
                    pattern_store: self.pattern_store.as_ref(),
                    info: &self.info,
                    theme,
                };
                self.registry.dispatch(&name, &args, &mut context)
            }
            _ => CommandOutcome::line(theme.dim("(Non-command input ignored)")),
        };

        self.emit_all(&outcome.lines);
        self.state = ConsoleState::Idle;

        match outcome.action {
            Some(ConsoleAction::ClearTranscript) => {
                if let Err(e) = self.transcript.clear() {
                    tracing::warn!("Failed to clear console: {}", e);
                }
                LoopControl::Continue
            }
            Some(ConsoleAction::Exit) => LoopControl::Exit,
            None => LoopControl::Continue,
        }
    }

    /// Render one live event
    pub fn handle_event(&mut self, event: &LogEvent) {
        let lines = self.live.render(&self.theme, &self.collapse, event);
        self.emit_all(&lines);
    }

    /// Run until `shutdown` fires or the user exits
    ///
    /// `/exit` cancels `shutdown` so the rest of the program stops too.
    /// End of input only stops reading; live output continues.
    pub async fn run(
        mut self,
        mut input: mpsc::UnboundedReceiver<String>,
        mut events: EventReceiver,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let mut input_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&event),
                    None => {
                        tracing::debug!("Event bus closed; console stopping");
                        break;
                    }
                },
                line = input.recv(), if input_open => match line {
                    Some(line) => {
                        if self.handle_line(&line) == LoopControl::Exit {
                            tracing::info!("Exit requested from console");
                            shutdown.cancel();
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Console input closed; proxy keeps running");
                        input_open = false;
                    }
                },
            }
        }

        // Show whatever arrived before shutdown
        while let Ok(event) = events.try_recv() {
            self.handle_event(&event);
        }
        Ok(self)
    }
}

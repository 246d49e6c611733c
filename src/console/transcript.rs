//! # Transcript Output
//!
//! Where console lines go. The terminal implementation writes through
//! crossterm; the memory implementation keeps lines for tests.
//!
//! ```text
//! Production:  Console ──▶ TerminalTranscript ──▶ stdout (crossterm)
//! Testing:     Console ──▶ MemoryTranscript   ──▶ Vec<String>
//! ```

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

/// Append-only console output that can be wiped
pub trait Transcript: Send {
    /// Append one line (without trailing newline)
    fn append(&mut self, line: &str) -> Result<()>;

    /// Remove everything shown so far
    fn clear(&mut self) -> Result<()>;
}

/// Transcript written to a terminal
pub struct TerminalTranscript<W: Write + Send = io::Stdout> {
    writer: W,
    interactive: bool,
}

impl TerminalTranscript<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
            interactive: atty::is(atty::Stream::Stdout),
        }
    }
}

impl<W: Write + Send> TerminalTranscript<W> {
    /// Wrap any writer; clearing only emits escape codes when `interactive`
    pub fn new(writer: W, interactive: bool) -> Self {
        Self {
            writer,
            interactive,
        }
    }
}

impl<W: Write + Send> Transcript for TerminalTranscript<W> {
    fn append(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.interactive {
            execute!(self.writer, Clear(ClearType::All), Clear(ClearType::Purge), MoveTo(0, 0))?;
        }
        Ok(())
    }
}

/// Transcript kept in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryTranscript {
    lines: Vec<String>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl Transcript for MemoryTranscript {
    fn append(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.lines.clear();
        Ok(())
    }
}

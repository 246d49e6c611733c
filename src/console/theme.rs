//! Console colors
//!
//! Every styled string goes through [`Theme`] so color can be switched
//! off for pipes, dumb terminals and tests.

use crossterm::style::{Color, Stylize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    color: bool,
}

impl Theme {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Theme that never emits escape sequences
    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_colored(&self) -> bool {
        self.color
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn heading(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint(text, Color::DarkGrey)
    }

    pub fn error(&self, text: &str) -> String {
        self.paint(text, Color::Red)
    }

    /// Color by status class: 2xx green, 3xx yellow, the rest red
    pub fn status(&self, code: u16, text: &str) -> String {
        let color = match code {
            200..=299 => Color::Green,
            300..=399 => Color::Yellow,
            _ => Color::Red,
        };
        self.paint(text, color)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::plain()
    }
}

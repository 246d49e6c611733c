//! Glob-style URL patterns
//!
//! `*` matches any run of characters (slashes included), `?` matches one
//! character and `[...]` / `[!...]` are character classes. Everything else
//! is literal, and a pattern must match the whole URL.

use regex::{Regex, RegexBuilder};
use std::fmt;

use super::PatternError;

/// A validated collapse pattern; its text is its identity
#[derive(Debug, Clone)]
pub struct CollapsePattern {
    text: String,
    matcher: Regex,
}

impl CollapsePattern {
    /// Validate and compile `text`
    pub fn compile(text: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PatternError::Empty);
        }

        let source = glob_to_regex(text)?;
        let matcher = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|source| PatternError::Invalid {
                pattern: text.to_string(),
                source,
            })?;

        Ok(Self {
            text: text.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, url: &str) -> bool {
        self.matcher.is_match(url)
    }
}

impl PartialEq for CollapsePattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for CollapsePattern {}

impl fmt::Display for CollapsePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn glob_to_regex(glob: &str) -> Result<String, PatternError> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let negated = chars.next_if_eq(&'!').is_some();
                let mut class = String::new();
                let mut closed = false;
                let mut first = true;
                for c in chars.by_ref() {
                    // A ']' right after the opening bracket is a literal
                    if c == ']' && !first {
                        closed = true;
                        break;
                    }
                    first = false;
                    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if !closed {
                    return Err(PatternError::UnterminatedClass {
                        pattern: glob.to_string(),
                    });
                }
                out.push('[');
                if negated {
                    out.push('^');
                }
                out.push_str(&class);
                out.push(']');
            }
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }

    out.push('$');
    Ok(out)
}

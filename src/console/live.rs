//! Live traffic rendering
//!
//! Turns bus events into transcript lines as they arrive. Keeps just
//! enough state per in-flight exchange to buffer bodies and to remember
//! whether the response was collapsed.

use bytes::BytesMut;
use crossterm::style::Color;
use std::collections::HashMap;

use super::render::{
    collapsed_placeholder, error_section, format_body, request_section, response_section,
    streaming_marker, SseFormatter,
};
use super::theme::Theme;
use crate::collapse::CollapseRegistry;
use crate::events::{HeaderList, LogEvent, LogEventKind, RecordId};

#[derive(Debug, Default)]
struct InFlight {
    url: String,
    collapsed: bool,
    streaming: bool,
    response_headers: HeaderList,
    body: BytesMut,
    sse: SseFormatter,
}

/// Renders live events, tracking exchanges that have not finished yet
#[derive(Debug, Default)]
pub struct LiveRenderer {
    in_flight: HashMap<RecordId, InFlight>,
}

impl LiveRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchanges seen but not yet completed or failed
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Lines to append for `event`; collapse is decided when headers arrive
    pub fn render(
        &mut self,
        theme: &Theme,
        collapse: &CollapseRegistry,
        event: &LogEvent,
    ) -> Vec<String> {
        let id = event.record_id;
        match &event.kind {
            LogEventKind::Request {
                method,
                url,
                headers,
                body,
            } => {
                self.in_flight.insert(
                    id,
                    InFlight {
                        url: url.clone(),
                        ..InFlight::default()
                    },
                );
                let mut lines = vec![String::new()];
                lines.extend(request_section(theme, id, method, url, headers, body));
                lines
            }
            LogEventKind::Response {
                status,
                headers,
                streaming,
            } => {
                let entry = self.in_flight.entry(id).or_default();
                entry.collapsed = collapse.matches(&entry.url);
                entry.streaming = *streaming;
                entry.response_headers = headers.clone();

                let mut lines = vec![String::new()];
                lines.extend(response_section(theme, id, *status, headers));
                if entry.collapsed {
                    lines.push(format!(
                        "{}{}",
                        theme.bold("Body:"),
                        theme.dim(" [collapsed]")
                    ));
                } else if entry.streaming {
                    lines.push(streaming_marker(theme));
                }
                lines
            }
            LogEventKind::Chunk { data } => {
                let Some(entry) = self.in_flight.get_mut(&id) else {
                    return Vec::new();
                };
                if entry.collapsed {
                    entry.body.extend_from_slice(data);
                    Vec::new()
                } else if entry.streaming {
                    entry.sse.feed(theme, data)
                } else {
                    entry.body.extend_from_slice(data);
                    Vec::new()
                }
            }
            LogEventKind::Complete => {
                let Some(mut entry) = self.in_flight.remove(&id) else {
                    return Vec::new();
                };
                if entry.collapsed {
                    if entry.body.is_empty() {
                        Vec::new()
                    } else {
                        vec![collapsed_placeholder(theme, entry.body.len())]
                    }
                } else if entry.streaming {
                    let mut lines = entry.sse.finish(theme);
                    lines.push(theme.paint(&format!("[{id} complete]"), Color::Blue));
                    lines
                } else {
                    format_body(theme, &entry.response_headers, &entry.body)
                }
            }
            LogEventKind::Error { message } => {
                self.in_flight.remove(&id);
                let mut lines = vec![String::new()];
                lines.extend(error_section(theme, id, message));
                lines
            }
        }
    }
}

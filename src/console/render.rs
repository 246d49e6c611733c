//! Request and response formatting
//!
//! Pure functions turning captured exchanges into transcript lines. Used
//! by the live renderer and by `/view` and `/list`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::style::Color;
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use std::borrow::Cow;
use std::io::{self, Read};

use super::theme::Theme;
use crate::events::{HeaderList, RecordId};
use crate::history::{RecordState, RequestRecord};

/// Header values replaced by a `****last4` mask
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "x-user-auth",
    "x-api-key",
    "cookie",
    "set-cookie",
];

/// Header name prefixes highlighted in request header blocks
pub const IMPORTANT_PREFIXES: &[&str] = &["x-user-", "x-channel-", "x-app-", "x-api-"];

/// Bytes of a binary body shown as base64
const BINARY_PREVIEW_BYTES: usize = 48;

/// `200 OK` style status text; unknown codes show the number alone
pub fn status_text(code: u16) -> String {
    match reqwest::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
    {
        Some(reason) => format!("{code} {reason}"),
        None => code.to_string(),
    }
}

/// Case-insensitive header lookup returning the first value
pub fn header_value<'a>(headers: &'a HeaderList, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn mask_token(token: &str) -> String {
    let tail: Vec<char> = token.chars().rev().take(4).collect();
    let last: String = tail.into_iter().rev().collect();
    format!("****{last}")
}

/// Mask sensitive header values, keeping the auth scheme visible
pub fn mask_header_value(name: &str, value: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if !SENSITIVE_HEADERS.contains(&lower.as_str()) {
        return value.to_string();
    }

    if lower == "authorization" || lower == "proxy-authorization" {
        if let Some((scheme, token)) = value.split_once(' ') {
            return format!("{scheme} {}", mask_token(token));
        }
    }
    mask_token(value)
}

fn is_important_request_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "authorization"
        || lower == "content-type"
        || IMPORTANT_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
}

fn is_important_response_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-type") || name.eq_ignore_ascii_case("content-length")
}

fn header_block(theme: &Theme, headers: &HeaderList, important: fn(&str) -> bool) -> Vec<String> {
    let mut lines = vec![theme.bold("Headers:")];
    for (name, value) in headers {
        let line = format!("  {name}: {}", mask_header_value(name, value));
        if important(name) {
            lines.push(theme.paint(&line, Color::Magenta));
        } else {
            lines.push(theme.dim(&line));
        }
    }
    lines
}

pub fn request_headers(theme: &Theme, headers: &HeaderList) -> Vec<String> {
    header_block(theme, headers, is_important_request_header)
}

pub fn response_headers(theme: &Theme, headers: &HeaderList) -> Vec<String> {
    header_block(theme, headers, is_important_response_header)
}

/// Largest decoded body `/view` will hold in memory
pub const MAX_DECODED_BYTES: u64 = 64 * 1024 * 1024;

/// Undo a `Content-Encoding`; `None` means the body is not encoded
pub fn decompress(encoding: &str, body: &[u8]) -> io::Result<Option<Vec<u8>>> {
    decompress_limited(encoding, body, MAX_DECODED_BYTES)
}

/// [`decompress`] that fails once the output would exceed `limit` bytes
pub fn decompress_limited(encoding: &str, body: &[u8], limit: u64) -> io::Result<Option<Vec<u8>>> {
    let encoding = encoding.trim().to_ascii_lowercase();
    let decoder: Box<dyn Read + '_> = match encoding.as_str() {
        "" | "identity" => return Ok(None),
        "gzip" | "x-gzip" => Box::new(MultiGzDecoder::new(body)),
        "deflate" => Box::new(ZlibDecoder::new(body)),
        "zstd" => Box::new(zstd::stream::read::Decoder::new(body)?),
        other => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported content encoding '{other}'"),
            ))
        }
    };

    let mut decoded = Vec::new();
    decoder.take(limit.saturating_add(1)).read_to_end(&mut decoded)?;
    if decoded.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decoded body exceeds {limit} bytes"),
        ));
    }
    Ok(Some(decoded))
}

fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode body bytes as text using the declared charset, else UTF-8
///
/// Returns `None` for bodies that are not text.
pub fn decode_text(content_type: Option<&str>, bytes: &[u8]) -> Option<String> {
    if let Some(label) = content_type.and_then(charset) {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (text, _, _) = encoding.decode(bytes);
            return Some(text.into_owned());
        }
    }
    std::str::from_utf8(bytes)
        .ok()
        .map(|text| text.trim_start_matches('\u{feff}').to_string())
}

pub fn pretty_json_lines(value: &serde_json::Value) -> Vec<String> {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => pretty.lines().map(str::to_string).collect(),
        Err(_) => vec![value.to_string()],
    }
}

/// Pretty-print JSON objects and arrays; other text is shown as-is
pub fn format_text(theme: &Theme, text: &str) -> Vec<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        if value.is_object() || value.is_array() {
            return pretty_json_lines(&value)
                .iter()
                .map(|line| theme.paint(line, Color::White))
                .collect();
        }
    }
    text.lines().map(str::to_string).collect()
}

pub fn format_binary(theme: &Theme, bytes: &[u8]) -> String {
    let preview = &bytes[..bytes.len().min(BINARY_PREVIEW_BYTES)];
    let ellipsis = if bytes.len() > BINARY_PREVIEW_BYTES { "..." } else { "" };
    format!(
        "{} {}{}",
        theme.paint(&format!("[binary {} bytes]", bytes.len()), Color::Yellow),
        theme.dim(&BASE64.encode(preview)),
        theme.dim(ellipsis)
    )
}

/// `Body:` block for a complete body; empty bodies produce no lines
pub fn format_body(theme: &Theme, headers: &HeaderList, body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![theme.bold("Body:")];
    let encoding = header_value(headers, "content-encoding").unwrap_or("");
    let decoded: Cow<'_, [u8]> = match decompress(encoding, body) {
        Ok(Some(decoded)) => Cow::Owned(decoded),
        Ok(None) => Cow::Borrowed(body),
        Err(e) => {
            tracing::debug!("Could not decode {} body: {}", encoding, e);
            lines.push(theme.error(&format!("Failed to decompress {encoding} body: {e}")));
            lines.push(theme.dim(&format!("Raw {encoding} data length: {} bytes", body.len())));
            return lines;
        }
    };

    match decode_text(header_value(headers, "content-type"), &decoded) {
        Some(text) => lines.extend(format_text(theme, &text)),
        None => lines.push(format_binary(theme, &decoded)),
    }
    lines
}

pub fn collapsed_placeholder(theme: &Theme, len: usize) -> String {
    format!(
        "{} {}",
        theme.bold("Body:"),
        theme.dim(&format!(
            "[collapsed] {len} bytes (matches collapse pattern)"
        ))
    )
}

pub fn streaming_marker(theme: &Theme) -> String {
    format!("{}{}", theme.bold("Body:"), theme.paint(" [streaming]", Color::Yellow))
}

/// Incremental formatter for server-sent-event and NDJSON streams
///
/// Chunks may split lines anywhere, so partial lines are held back until
/// their newline arrives or the stream ends.
#[derive(Debug, Default)]
pub struct SseFormatter {
    pending: Vec<u8>,
    events: usize,
}

impl SseFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, theme: &Theme, data: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            self.format_line(theme, line.trim_end_matches(['\r', '\n']), &mut lines);
        }
        lines
    }

    /// Flush a trailing line that never got its newline
    pub fn finish(&mut self, theme: &Theme) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw);
            self.format_line(theme, line.trim_end_matches(['\r', '\n']), &mut lines);
        }
        lines
    }

    fn format_line(&mut self, theme: &Theme, line: &str, out: &mut Vec<String>) {
        if line.trim().is_empty() {
            return;
        }

        let payload = match line.strip_prefix("data:") {
            Some(data) => data.trim_start(),
            None => line,
        };
        if payload == "[DONE]" {
            out.push(theme.heading("=== Stream Complete ===", Color::Blue));
            return;
        }

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) if value.is_object() || value.is_array() => {
                self.events += 1;
                out.push(theme.heading(&format!("--- Event {} ---", self.events), Color::Cyan));
                out.extend(pretty_json_lines(&value));
            }
            _ => out.push(theme.dim(line)),
        }
    }
}

/// One-line `/list` summary of a record
pub fn record_summary(theme: &Theme, record: &RequestRecord) -> String {
    let outcome = match (record.state(), record.error(), record.response_status()) {
        (RecordState::Failed, Some(error), _) => theme.error(&format!("Error: {error}")),
        (_, _, Some(code)) if record.state() == RecordState::Completed => {
            theme.status(code, &status_text(code))
        }
        (_, _, Some(code)) => format!(
            "{} {}",
            theme.status(code, &status_text(code)),
            theme.dim(if record.is_streaming() {
                "(streaming)"
            } else {
                "(pending)"
            })
        ),
        _ => theme.dim("(pending)"),
    };

    format!(
        "{} {} {}  {}  {}",
        theme.dim(&record.id().to_string()),
        theme.paint(record.method(), Color::Cyan),
        record.url(),
        outcome,
        theme.dim(&record.timestamp().format("%H:%M:%S").to_string())
    )
}

pub fn request_section(
    theme: &Theme,
    id: RecordId,
    method: &str,
    url: &str,
    headers: &HeaderList,
    body: &[u8],
) -> Vec<String> {
    let mut lines = vec![
        theme.heading(&format!("=== Request {id} ==="), Color::Cyan),
        format!("{}{method}", theme.bold("Method: ")),
        format!("{}{url}", theme.bold("URL: ")),
    ];
    lines.extend(request_headers(theme, headers));
    lines.extend(format_body(theme, headers, body));
    lines
}

pub fn response_section(theme: &Theme, id: RecordId, status: u16, headers: &HeaderList) -> Vec<String> {
    let mut lines = vec![
        theme.heading(&format!("=== Response {id} ==="), Color::Green),
        format!("{}{}", theme.bold("Status: "), theme.status(status, &status_text(status))),
    ];
    lines.extend(response_headers(theme, headers));
    lines
}

pub fn error_section(theme: &Theme, id: RecordId, message: &str) -> Vec<String> {
    vec![
        theme.heading(&format!("=== Error {id} ==="), Color::Red),
        format!("{}{}", theme.bold("Error: "), theme.error(message)),
    ]
}

/// Full `/view` rendering; `collapsed` hides the response body
pub fn record_detail(theme: &Theme, record: &RequestRecord, collapsed: bool) -> Vec<String> {
    let mut lines = request_section(
        theme,
        record.id(),
        record.method(),
        record.url(),
        record.request_headers(),
        record.request_body(),
    );
    lines.push(theme.dim(&format!(
        "Captured at {}",
        record.timestamp().format("%Y-%m-%d %H:%M:%S")
    )));

    if let Some(status) = record.response_status() {
        lines.push(String::new());
        lines.extend(response_section(theme, record.id(), status, record.response_headers()));
        if let Some(duration) = record.duration() {
            lines.push(format!("{}{} ms", theme.bold("Duration: "), duration.as_millis()));
        }

        if collapsed {
            let len = record
                .response_body()
                .map(|body| body.len())
                .unwrap_or_else(|| record.received_body_len());
            lines.push(collapsed_placeholder(theme, len));
        } else if record.is_streaming() {
            lines.push(streaming_marker(theme));
            let mut formatter = SseFormatter::new();
            for chunk in record.chunks() {
                lines.extend(formatter.feed(theme, chunk));
            }
            lines.extend(formatter.finish(theme));
        } else if let Some(body) = record.response_body() {
            lines.extend(format_body(theme, record.response_headers(), body));
        } else if record.state() == RecordState::Pending {
            lines.push(theme.dim(&format!(
                "(pending) {} bytes received so far",
                record.received_body_len()
            )));
        }
    }

    match (record.state(), record.error()) {
        (RecordState::Failed, Some(error)) => {
            lines.push(String::new());
            lines.extend(error_section(theme, record.id(), error));
        }
        (RecordState::Pending, _) if record.response_status().is_none() => {
            lines.push(String::new());
            lines.push(theme.heading(&format!("=== Response {} ===", record.id()), Color::DarkGrey));
            lines.push(theme.dim("(pending)"));
        }
        _ => {}
    }
    lines
}

//! # Core Event Types
//!
//! Lifecycle events published by the proxy for every captured request,
//! plus the record identifier that ties them together.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered list of HTTP header name/value pairs, as seen on the wire
pub type HeaderList = Vec<(String, String)>;

/// Identifier of a captured request, allocated when the request starts
///
/// Ids are monotonically increasing, so their ordering matches the
/// chronological order in which requests reached the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe allocator for [`RecordId`]s, starting at 1
#[derive(Debug)]
pub struct RecordIdGenerator {
    next: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RecordId {
        RecordId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// One stage of a request's lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum LogEventKind {
    /// Inbound request received from the client
    Request {
        method: String,
        url: String,
        headers: HeaderList,
        body: Bytes,
    },
    /// Upstream response headers arrived; the body may still be in flight
    Response {
        status: u16,
        headers: HeaderList,
        streaming: bool,
    },
    /// One fragment of the upstream response body, in arrival order
    Chunk { data: Bytes },
    /// Upstream signalled end of the response body
    Complete,
    /// Forwarding or relaying failed
    Error { message: String },
}

impl LogEventKind {
    /// Short label used in debug logs
    pub fn label(&self) -> &'static str {
        match self {
            LogEventKind::Request { .. } => "request",
            LogEventKind::Response { .. } => "response",
            LogEventKind::Chunk { .. } => "chunk",
            LogEventKind::Complete => "complete",
            LogEventKind::Error { .. } => "error",
        }
    }
}

/// Transient notification carried on the event bus
///
/// Events are not retained. Consumers copy whatever they need.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub record_id: RecordId,
    pub kind: LogEventKind,
}

impl LogEvent {
    pub fn new(record_id: RecordId, kind: LogEventKind) -> Self {
        Self { record_id, kind }
    }

    pub fn request(
        record_id: RecordId,
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HeaderList,
        body: Bytes,
    ) -> Self {
        Self::new(
            record_id,
            LogEventKind::Request {
                method: method.into(),
                url: url.into(),
                headers,
                body,
            },
        )
    }

    pub fn response(record_id: RecordId, status: u16, headers: HeaderList, streaming: bool) -> Self {
        Self::new(
            record_id,
            LogEventKind::Response {
                status,
                headers,
                streaming,
            },
        )
    }

    pub fn chunk(record_id: RecordId, data: Bytes) -> Self {
        Self::new(record_id, LogEventKind::Chunk { data })
    }

    pub fn complete(record_id: RecordId) -> Self {
        Self::new(record_id, LogEventKind::Complete)
    }

    pub fn error(record_id: RecordId, message: impl Into<String>) -> Self {
        Self::new(
            record_id,
            LogEventKind::Error {
                message: message.into(),
            },
        )
    }
}

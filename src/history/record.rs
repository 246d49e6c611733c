//! Captured request/response record
//!
//! A record is created in the `Pending` state when the proxy receives a
//! request and is mutated in place as lifecycle events arrive, until it
//! reaches a terminal state. Terminal records never change again.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

use crate::events::{HeaderList, RecordId};

/// Lifecycle state derived from which fields of a record are populated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Completed,
    Failed,
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordState::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Pending => "pending",
            RecordState::Completed => "completed",
            RecordState::Failed => "failed",
        }
    }
}

/// One captured request and its response (or error)
#[derive(Debug, Clone)]
pub struct RequestRecord {
    id: RecordId,
    timestamp: DateTime<Local>,
    method: String,
    url: String,
    request_headers: HeaderList,
    request_body: Bytes,
    response_status: Option<u16>,
    response_headers: HeaderList,
    response_body: Option<Bytes>,
    chunks: Vec<Bytes>,
    streaming: bool,
    error: Option<String>,
    duration: Option<Duration>,
    started: Instant,
    // Non-streamed body bytes received so far
    body_buffer: BytesMut,
}

impl RequestRecord {
    /// Create a pending record for a request that just started
    pub fn new(
        id: RecordId,
        method: String,
        url: String,
        request_headers: HeaderList,
        request_body: Bytes,
    ) -> Self {
        Self {
            id,
            timestamp: Local::now(),
            method,
            url,
            request_headers,
            request_body,
            response_status: None,
            response_headers: Vec::new(),
            response_body: None,
            chunks: Vec::new(),
            streaming: false,
            error: None,
            duration: None,
            started: Instant::now(),
            body_buffer: BytesMut::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_headers(&self) -> &HeaderList {
        &self.request_headers
    }

    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    pub fn response_headers(&self) -> &HeaderList {
        &self.response_headers
    }

    pub fn response_body(&self) -> Option<&Bytes> {
        self.response_body.as_ref()
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Time from request start until response headers (or failure)
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn state(&self) -> RecordState {
        if self.error.is_some() {
            RecordState::Failed
        } else if self.response_body.is_some() {
            RecordState::Completed
        } else {
            RecordState::Pending
        }
    }

    /// Bytes of response body received so far, complete or not
    pub fn received_body_len(&self) -> usize {
        match &self.response_body {
            Some(body) => body.len(),
            None if self.streaming => self.chunks.iter().map(Bytes::len).sum(),
            None => self.body_buffer.len(),
        }
    }

    pub(crate) fn set_response(&mut self, status: u16, headers: HeaderList, streaming: bool) {
        if self.state().is_terminal() {
            return;
        }
        self.response_status = Some(status);
        self.response_headers = headers;
        self.streaming = streaming;
        self.duration = Some(self.started.elapsed());
    }

    pub(crate) fn push_chunk(&mut self, data: &Bytes) {
        if self.state().is_terminal() {
            return;
        }
        if self.streaming {
            self.chunks.push(data.clone());
        } else {
            self.body_buffer.extend_from_slice(data);
        }
    }

    pub(crate) fn complete(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        let body = if self.streaming {
            let mut joined = BytesMut::with_capacity(self.received_body_len());
            for chunk in &self.chunks {
                joined.extend_from_slice(chunk);
            }
            joined.freeze()
        } else {
            self.body_buffer.split().freeze()
        };
        self.response_body = Some(body);
        if self.duration.is_none() {
            self.duration = Some(self.started.elapsed());
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        if self.state().is_terminal() {
            return;
        }
        self.error = Some(message);
        self.body_buffer.clear();
        if self.duration.is_none() {
            self.duration = Some(self.started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_record() -> RequestRecord {
        RequestRecord::new(
            RecordId::new(1),
            "POST".to_string(),
            "/v1/chat".to_string(),
            vec![("content-type".to_string(), "application/json".to_string())],
            Bytes::from_static(b"{}"),
        )
    }

    #[test]
    fn new_record_should_be_pending() {
        let record = pending_record();
        assert_eq!(record.state(), RecordState::Pending);
        assert!(record.response_body().is_none());
        assert!(record.error().is_none());
    }

    #[test]
    fn non_streamed_body_should_not_populate_chunks() {
        let mut record = pending_record();
        record.set_response(200, Vec::new(), false);
        record.push_chunk(&Bytes::from_static(b"hel"));
        record.push_chunk(&Bytes::from_static(b"lo"));
        assert_eq!(record.state(), RecordState::Pending);
        assert_eq!(record.received_body_len(), 5);

        record.complete();
        assert_eq!(record.state(), RecordState::Completed);
        assert_eq!(record.response_body().unwrap(), &Bytes::from_static(b"hello"));
        assert!(record.chunks().is_empty());
    }

    #[test]
    fn streamed_body_should_keep_chunks_and_concatenate() {
        let mut record = pending_record();
        record.set_response(200, Vec::new(), true);
        record.push_chunk(&Bytes::from_static(b"data: 1\n\n"));
        record.push_chunk(&Bytes::from_static(b"data: 2\n\n"));
        record.complete();

        assert_eq!(record.chunks().len(), 2);
        assert_eq!(
            record.response_body().unwrap(),
            &Bytes::from_static(b"data: 1\n\ndata: 2\n\n")
        );
    }

    #[test]
    fn terminal_record_should_ignore_further_changes() {
        let mut record = pending_record();
        record.set_response(200, Vec::new(), false);
        record.complete();
        record.fail("late error".to_string());
        record.push_chunk(&Bytes::from_static(b"late"));

        assert_eq!(record.state(), RecordState::Completed);
        assert!(record.error().is_none());
        assert!(record.response_body().unwrap().is_empty());
    }

    #[test]
    fn failed_record_should_never_gain_a_body() {
        let mut record = pending_record();
        record.set_response(200, Vec::new(), false);
        record.push_chunk(&Bytes::from_static(b"partial"));
        record.fail("connection reset".to_string());
        record.complete();

        assert_eq!(record.state(), RecordState::Failed);
        assert_eq!(record.error(), Some("connection reset"));
        assert!(record.response_body().is_none());
        assert!(record.duration().is_some());
    }
}

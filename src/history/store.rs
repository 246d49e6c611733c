//! Bounded, insertion-ordered store of captured records

use std::collections::VecDeque;

use super::record::{RecordState, RequestRecord};
use crate::events::{LogEvent, LogEventKind, RecordId};

/// Snapshot of record counts by state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub capacity: usize,
}

impl HistoryStats {
    /// `completed / total`, or 0 when nothing has been captured
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn success_percent(&self) -> u32 {
        (self.success_rate() * 100.0).round() as u32
    }
}

/// Ring buffer of [`RequestRecord`]s with FIFO eviction
///
/// The store is the sole owner of its records. Records are created by
/// `Request` events and updated in place by later events with the same id.
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<RequestRecord>,
    capacity: usize,
}

impl HistoryStore {
    /// Create a store holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply one lifecycle event. Returns false when the event was dropped.
    pub fn apply(&mut self, event: &LogEvent) -> bool {
        if let LogEventKind::Request {
            method,
            url,
            headers,
            body,
        } = &event.kind
        {
            return self.insert(RequestRecord::new(
                event.record_id,
                method.clone(),
                url.clone(),
                headers.clone(),
                body.clone(),
            ));
        }

        let Some(record) = self.find_mut(event.record_id) else {
            // Evicted (or never seen): eviction is final
            tracing::debug!(
                "Dropping {} event for unknown record {}",
                event.kind.label(),
                event.record_id
            );
            return false;
        };

        match &event.kind {
            LogEventKind::Response {
                status,
                headers,
                streaming,
            } => record.set_response(*status, headers.clone(), *streaming),
            LogEventKind::Chunk { data } => record.push_chunk(data),
            LogEventKind::Complete => record.complete(),
            LogEventKind::Error { message } => record.fail(message.clone()),
            // Handled by insert above
            LogEventKind::Request { .. } => {}
        }
        true
    }

    fn insert(&mut self, record: RequestRecord) -> bool {
        if let Some(last) = self.records.back() {
            if record.id() <= last.id() {
                tracing::warn!(
                    "Ignoring out-of-order request {} (latest is {})",
                    record.id(),
                    last.id()
                );
                return false;
            }
        }

        if self.records.len() >= self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                tracing::debug!(
                    "History full ({}), evicted {} in state {}",
                    self.capacity,
                    evicted.id(),
                    evicted.state().as_str()
                );
            }
        }
        self.records.push_back(record);
        true
    }

    fn find_mut(&mut self, id: RecordId) -> Option<&mut RequestRecord> {
        let index = self
            .records
            .binary_search_by_key(&id, RequestRecord::id)
            .ok()?;
        self.records.get_mut(index)
    }

    /// All records, oldest first
    pub fn get_all(&self) -> Vec<&RequestRecord> {
        self.records.iter().collect()
    }

    /// The `n` most recent records, most recent first
    pub fn get_last(&self, n: usize) -> Vec<&RequestRecord> {
        self.records.iter().rev().take(n).collect()
    }

    /// Record at position `n` counted from the most recent (`1` = latest)
    pub fn get_by_index(&self, n: usize) -> Option<&RequestRecord> {
        if n == 0 {
            return None;
        }
        self.records.iter().rev().nth(n - 1)
    }

    /// Record with the given absolute id, if it is still retained
    pub fn get_by_id(&self, id: RecordId) -> Option<&RequestRecord> {
        let index = self
            .records
            .binary_search_by_key(&id, RequestRecord::id)
            .ok()?;
        self.records.get(index)
    }

    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            total: self.records.len(),
            completed: 0,
            failed: 0,
            pending: 0,
            capacity: self.capacity,
        };
        for record in &self.records {
            match record.state() {
                RecordState::Pending => stats.pending += 1,
                RecordState::Completed => stats.completed += 1,
                RecordState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(id: u64, url: &str) -> LogEvent {
        LogEvent::request(RecordId::new(id), "GET", url, Vec::new(), Bytes::new())
    }

    fn complete_exchange(store: &mut HistoryStore, id: u64, url: &str, body: &'static [u8]) {
        let record_id = RecordId::new(id);
        store.apply(&request(id, url));
        store.apply(&LogEvent::response(record_id, 200, Vec::new(), false));
        store.apply(&LogEvent::chunk(record_id, Bytes::from_static(body)));
        store.apply(&LogEvent::complete(record_id));
    }

    fn urls(records: &[&RequestRecord]) -> Vec<String> {
        records.iter().map(|r| r.url().to_string()).collect()
    }

    #[test]
    fn store_should_evict_oldest_when_full() {
        let mut store = HistoryStore::new(2);
        complete_exchange(&mut store, 1, "/a", b"A");
        complete_exchange(&mut store, 2, "/b", b"B");
        complete_exchange(&mut store, 3, "/c", b"C");

        assert_eq!(urls(&store.get_all()), vec!["/b", "/c"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_should_hold_min_of_requests_and_capacity() {
        for (k, m) in [(0usize, 3usize), (2, 3), (3, 3), (7, 3), (5, 1)] {
            let mut store = HistoryStore::new(m);
            for id in 1..=k as u64 {
                complete_exchange(&mut store, id, &format!("/{id}"), b"ok");
            }
            let all = store.get_all();
            assert_eq!(all.len(), k.min(m));
            let expected: Vec<u64> = ((k.saturating_sub(m) + 1) as u64..=k as u64).collect();
            let ids: Vec<u64> = all.iter().map(|r| r.id().value()).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn events_for_evicted_record_should_be_dropped() {
        let mut store = HistoryStore::new(1);
        store.apply(&request(1, "/slow"));
        store.apply(&request(2, "/fast"));

        let late = LogEvent::response(RecordId::new(1), 200, Vec::new(), false);
        assert!(!store.apply(&late));
        assert!(!store.apply(&LogEvent::complete(RecordId::new(1))));

        assert_eq!(urls(&store.get_all()), vec!["/fast"]);
        assert!(store.get_by_id(RecordId::new(1)).is_none());
    }

    #[test]
    fn get_last_should_return_most_recent_first() {
        let mut store = HistoryStore::new(10);
        for (id, url) in [(1, "/a"), (2, "/b"), (3, "/c")] {
            complete_exchange(&mut store, id, url, b"");
        }

        assert_eq!(urls(&store.get_last(2)), vec!["/c", "/b"]);
        assert_eq!(urls(&store.get_last(10)), vec!["/c", "/b", "/a"]);
        assert!(store.get_last(0).is_empty());
    }

    #[test]
    fn get_by_index_should_count_from_latest() {
        let mut store = HistoryStore::new(10);
        store.apply(&request(1, "/a"));
        store.apply(&request(2, "/b"));

        assert_eq!(store.get_by_index(1).unwrap().url(), "/b");
        assert_eq!(store.get_by_index(2).unwrap().url(), "/a");
        assert!(store.get_by_index(0).is_none());
        assert!(store.get_by_index(3).is_none());
    }

    #[test]
    fn stats_should_account_for_every_record() {
        let mut store = HistoryStore::new(10);
        complete_exchange(&mut store, 1, "/ok", b"fine");
        store.apply(&request(2, "/broken"));
        store.apply(&LogEvent::error(RecordId::new(2), "connection refused"));
        store.apply(&request(3, "/waiting"));

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed + stats.failed + stats.pending, stats.total);
        assert!((stats.success_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(stats.success_percent(), 33);
    }

    #[test]
    fn empty_store_should_report_zero_success_rate() {
        let store = HistoryStore::new(5);
        let stats = store.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.capacity, 5);
    }

    #[test]
    fn duplicate_request_id_should_be_ignored() {
        let mut store = HistoryStore::new(5);
        assert!(store.apply(&request(1, "/a")));
        assert!(!store.apply(&request(1, "/again")));
        assert_eq!(urls(&store.get_all()), vec!["/a"]);
    }

    #[test]
    fn zero_capacity_should_be_raised_to_one() {
        let store = HistoryStore::new(0);
        assert_eq!(store.capacity(), 1);
    }
}

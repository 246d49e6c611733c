//! # History
//!
//! Bounded record of captured request/response pairs, maintained by a
//! single bus subscriber and read by the console.

pub mod record;
pub mod store;
pub mod subscriber;

pub use record::{RecordState, RequestRecord};
pub use store::{HistoryStats, HistoryStore};
pub use subscriber::{shared_history, HistorySubscriber, SharedHistory};

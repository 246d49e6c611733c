//! # Events Module
//!
//! Re-exports the lifecycle event types and the bus that carries them
//! from the proxy to the history subscriber and the console.

pub mod event_bus;
pub mod types;

pub use event_bus::{EventBus, EventReceiver, SimpleEventBus};
pub use types::{HeaderList, LogEvent, LogEventKind, RecordId, RecordIdGenerator};

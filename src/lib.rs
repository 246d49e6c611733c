//! # tapline - HTTP debugging proxy with a command console
//!
//! Sits between a client application and its HTTP API, forwards every
//! request unchanged, and shows each exchange live. Captured exchanges
//! stay in a bounded history that can be listed and re-viewed from the
//! console.
//!
//! ## Architecture
//!
//! ```text
//!  client ──▶ ┌─────────────┐ ──▶ upstream API
//!             │ ProxyServer │
//!  client ◀── └─────────────┘ ◀──
//!                    │ publish(LogEvent)
//!                    ▼
//!             ┌─────────────┐   subscribe   ┌──────────────────┐
//!             │  EventBus   │──────────────▶│ HistorySubscriber│──▶ HistoryStore
//!             └─────────────┘               └──────────────────┘        ▲
//!                    │ subscribe                                        │ read
//!                    ▼                                                  │
//!             ┌─────────────┐  /list /view /stats /collapse ...         │
//!             │   Console   │───────────────────────────────────────────┘
//!             │ (+ collapse │
//!             │  patterns)  │
//!             └─────────────┘
//! ```
//!
//! Every exchange gets a [`events::RecordId`]. Its events always arrive in
//! the order `Request`, `Response`, `Chunk`*, then `Complete` or `Error`.

pub mod app;
pub mod cmd_args;
pub mod collapse;
pub mod config;
pub mod console;
pub mod events;
pub mod history;
pub mod logging;
pub mod proxy;

// Re-export main types for easy access
pub use collapse::{CollapsePattern, CollapseRegistry, PatternStore};
pub use config::{ConfigError, ProxyConfig};
pub use console::{Console, MemoryTranscript, TerminalTranscript, Theme, Transcript};
pub use events::{EventBus, LogEvent, LogEventKind, RecordId, SimpleEventBus};
pub use history::{HistoryStore, RequestRecord, SharedHistory};
pub use proxy::ProxyServer;

//! # Proxy Server
//!
//! Transparent HTTP forwarding with capture. Each exchange publishes
//! `Request`, then `Response`, then zero or more `Chunk` events and finally
//! one of `Complete` or `Error`, all tagged with the same record id.

pub mod forward;
pub mod relay;
pub mod server;

pub use server::{router, ProxyServer, ProxyState};

/// Render an error with its source chain, outermost first
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

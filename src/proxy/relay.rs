//! Upstream body relay
//!
//! Copies the upstream body to the client chunk by chunk while mirroring
//! each chunk onto the event bus. Ends every exchange with exactly one
//! terminal event.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::{EventBus, LogEvent, RecordId};

/// Chunks buffered between the relay task and the client connection
pub const RELAY_BUFFER: usize = 32;

pub const CLIENT_DISCONNECTED: &str = "client disconnected";

/// Drive `upstream` to the client side of `sender`, publishing as it goes
///
/// Publishes `Chunk` per received chunk, then `Complete` when the
/// upstream body ends. An upstream read failure or a client that stops
/// listening publishes `Error` instead.
pub async fn relay_body<S, E>(
    bus: Arc<dyn EventBus>,
    record_id: RecordId,
    upstream: S,
    sender: mpsc::Sender<Result<Bytes, io::Error>>,
) where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: std::error::Error + Send,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut received = 0usize;

    loop {
        let next = tokio::select! {
            next = upstream.next() => next,
            _ = sender.closed() => {
                tracing::info!("Client for {} went away after {} bytes", record_id, received);
                bus.publish(LogEvent::error(record_id, CLIENT_DISCONNECTED));
                return;
            }
        };

        match next {
            Some(Ok(chunk)) => {
                received += chunk.len();
                bus.publish(LogEvent::chunk(record_id, chunk.clone()));
                if sender.send(Ok(chunk)).await.is_err() {
                    tracing::info!("Client for {} went away after {} bytes", record_id, received);
                    bus.publish(LogEvent::error(record_id, CLIENT_DISCONNECTED));
                    return;
                }
            }
            Some(Err(e)) => {
                let message = super::error_chain(&e);
                tracing::warn!("Upstream body for {} failed: {}", record_id, message);
                bus.publish(LogEvent::error(record_id, message.clone()));
                // Aborts the client response instead of ending it cleanly
                let _ = sender.send(Err(io::Error::other(message))).await;
                return;
            }
            None => {
                tracing::debug!("Upstream body for {} complete: {} bytes", record_id, received);
                bus.publish(LogEvent::complete(record_id));
                return;
            }
        }
    }
}

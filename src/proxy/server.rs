//! HTTP proxy server
//!
//! Every request, whatever its method or path, lands in one fallback
//! handler that captures it, forwards it upstream and relays the answer.

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::forward::{
    filter_headers, header_list, is_forwardable_request_header, is_forwardable_response_header,
    is_streaming_response, upstream_url,
};
use super::relay::{relay_body, CLIENT_DISCONNECTED, RELAY_BUFFER};
use crate::config::ProxyConfig;
use crate::events::{EventBus, HeaderList, LogEvent, RecordId, RecordIdGenerator};

/// Shared state of the proxy handler
pub struct ProxyState {
    bus: Arc<dyn EventBus>,
    client: reqwest::Client,
    upstream_base: String,
    ids: RecordIdGenerator,
    // Held while allocating an id and publishing its Request event
    admission: Mutex<()>,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig, bus: Arc<dyn EventBus>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            bus,
            client,
            upstream_base: config.upstream_base().to_string(),
            ids: RecordIdGenerator::new(),
            admission: Mutex::new(()),
        })
    }

    /// Allocate the next record id and announce the request under it
    ///
    /// Concurrent requests are admitted one at a time so subscribers see
    /// `Request` events in id order.
    fn admit(&self, method: &str, url: &str, headers: HeaderList, body: Bytes) -> RecordId {
        let _guard = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let record_id = self.ids.next_id();
        self.bus
            .publish(LogEvent::request(record_id, method, url, headers, body));
        record_id
    }
}

/// Build the router serving every path through the proxy handler
pub fn router(state: Arc<ProxyState>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Bound listener plus handler state, ready to serve
pub struct ProxyServer {
    listener: TcpListener,
    state: Arc<ProxyState>,
    max_body_bytes: usize,
}

impl ProxyServer {
    /// Bind the configured address; fails if the port is unavailable
    pub async fn bind(config: &ProxyConfig, bus: Arc<dyn EventBus>) -> anyhow::Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

        Ok(Self {
            listener,
            state: Arc::new(ProxyState::new(config, bus)?),
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires, then give in-flight exchanges `grace`
    /// to finish before abandoning them
    pub async fn run(self, shutdown: CancellationToken, grace: Duration) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        let app = router(self.state, self.max_body_bytes);
        let listener = self.listener;
        let signal = shutdown.clone();

        tracing::info!("Proxy listening on {}", addr);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        tokio::select! {
            result = &mut server => return Ok(result??),
            _ = shutdown.cancelled() => {}
        }

        match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => {
                result??;
                tracing::info!("Proxy shut down gracefully");
            }
            Err(_) => {
                tracing::warn!(
                    "In-flight requests still open after {:?}; aborting them",
                    grace
                );
                server.abort();
            }
        }
        Ok(())
    }
}

async fn proxy_handler(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!("Rejected {} {}: {}", method, uri, rejection.body_text());
            return rejection.into_response();
        }
    };
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let record_id = state.admit(
        method.as_str(),
        &path_and_query,
        header_list(&headers),
        body.clone(),
    );
    tracing::info!("{} {} {}", record_id, method, path_and_query);

    // The exchange outlives this handler if the client hangs up, so the
    // record still ends in `Complete` or `Error`
    let (reply, response) = oneshot::channel();
    tokio::spawn(exchange(
        state,
        record_id,
        method,
        path_and_query,
        headers,
        body,
        reply,
    ));

    match response.await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!("Exchange {} ended without a response", record_id);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Forward one admitted request upstream and relay the answer through `reply`
async fn exchange(
    state: Arc<ProxyState>,
    record_id: RecordId,
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: Bytes,
    mut reply: oneshot::Sender<Response>,
) {
    let target = upstream_url(&state.upstream_base, &path_and_query);
    let request = state
        .client
        .request(method, &target)
        .headers(filter_headers(&headers, is_forwardable_request_header))
        .body(body)
        .send();

    let result = tokio::select! {
        result = request => result,
        _ = reply.closed() => {
            tracing::info!("Client for {} went away before {} answered", record_id, target);
            state.bus.publish(LogEvent::error(record_id, CLIENT_DISCONNECTED));
            return;
        }
    };

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => {
            let message = describe_upstream_error(&e);
            tracing::error!("Upstream request {} to {} failed: {}", record_id, target, message);
            state.bus.publish(LogEvent::error(record_id, message.clone()));
            let bad_gateway =
                (StatusCode::BAD_GATEWAY, format!("Bad Gateway: {message}")).into_response();
            if reply.send(bad_gateway).is_err() {
                tracing::debug!("Client for {} gone before the 502 was sent", record_id);
            }
            return;
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let streaming = is_streaming_response(&upstream_headers);
    tracing::debug!("{} answered {} (streaming: {})", record_id, status, streaming);
    state.bus.publish(LogEvent::response(
        record_id,
        status.as_u16(),
        header_list(&upstream_headers),
        streaming,
    ));

    let (sender, receiver) = mpsc::channel(RELAY_BUFFER);
    let mut response = Response::new(Body::from_stream(ReceiverStream::new(receiver)));
    *response.status_mut() = status;
    *response.headers_mut() = filter_headers(&upstream_headers, is_forwardable_response_header);

    // A refused reply drops the body receiver, which the relay reports
    // as a client disconnect
    if reply.send(response).is_err() {
        tracing::debug!("Client for {} gone before headers were relayed", record_id);
    }
    relay_body(
        Arc::clone(&state.bus),
        record_id,
        upstream.bytes_stream(),
        sender,
    )
    .await;
}

fn describe_upstream_error(error: &reqwest::Error) -> String {
    let detail = super::error_chain(error);
    if error.is_timeout() {
        format!("upstream timed out: {detail}")
    } else if error.is_connect() {
        format!("upstream unreachable: {detail}")
    } else {
        detail
    }
}

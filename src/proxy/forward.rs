//! Upstream request preparation
//!
//! URL building and header filtering shared by the request and response
//! halves of the proxy. Only `host`, `content-length` and hop-by-hop
//! headers are touched; everything else passes through verbatim.

use axum::http::HeaderMap;

use crate::events::HeaderList;

/// Connection-scoped headers that must not be forwarded across a proxy
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Content types whose bodies are delivered as an incremental stream
pub const STREAMING_CONTENT_TYPES: &[&str] = &["text/event-stream", "application/x-ndjson"];

/// Append the client's path and query to the upstream base unchanged
pub fn upstream_url(base: &str, path_and_query: &str) -> String {
    let base = base.trim_end_matches('/');
    if path_and_query.is_empty() || path_and_query == "/" {
        return format!("{base}/");
    }
    if path_and_query.starts_with('/') {
        format!("{base}{path_and_query}")
    } else {
        format!("{base}/{path_and_query}")
    }
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Whether a client request header is copied to the upstream request
///
/// `host` is derived from the upstream URL and `content-length` from the
/// buffered body by the HTTP client.
pub fn is_forwardable_request_header(name: &str) -> bool {
    !(name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
        || is_hop_by_hop(name))
}

/// Whether an upstream response header is relayed to the client
pub fn is_forwardable_response_header(name: &str) -> bool {
    !is_hop_by_hop(name)
}

/// Copy the headers that pass `keep` into a new map, preserving repeats
pub fn filter_headers(headers: &HeaderMap, keep: fn(&str) -> bool) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if keep(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Snapshot headers as strings for capture; invalid UTF-8 is replaced
pub fn header_list(headers: &HeaderMap) -> HeaderList {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

pub fn is_streaming_response(headers: &HeaderMap) -> bool {
    headers
        .get_all(axum::http::header::CONTENT_TYPE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|content_type| {
            let content_type = content_type.to_ascii_lowercase();
            STREAMING_CONTENT_TYPES
                .iter()
                .any(|streaming| content_type.contains(streaming))
        })
}

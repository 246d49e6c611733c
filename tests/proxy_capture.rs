//! End-to-end capture through the proxy against a mocked upstream

mod common;

use common::Harness;
use std::collections::HashSet;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tapline::events::{LogEventKind, RecordId};
use tapline::history::RecordState;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn request_should_be_forwarded_and_captured() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(query_param("stream", "false"))
        .and(header("x-app-id", "demo"))
        .and(body_string(r#"{"model":"m"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"id":"resp-1"}"#, "application/json"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&format!("{}/v1", upstream.uri()), 10).await;
    let response = reqwest::Client::new()
        .post(proxy.url("/chat/completions?stream=false"))
        .header("x-app-id", "demo")
        .header("authorization", "Bearer sk-test-1234")
        .body(r#"{"model":"m"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), r#"{"id":"resp-1"}"#);

    proxy.wait_for_settled(1).await;
    {
        let history = proxy.history.read().unwrap_or_else(PoisonError::into_inner);
        let record = history.get_by_index(1).unwrap();
        assert_eq!(record.id(), RecordId::new(1));
        assert_eq!(record.method(), "POST");
        assert_eq!(record.url(), "/chat/completions?stream=false");
        assert_eq!(record.request_body().as_ref(), br#"{"model":"m"}"#);
        assert!(record
            .request_headers()
            .iter()
            .any(|(name, value)| name == "authorization" && value == "Bearer sk-test-1234"));
        assert_eq!(record.response_status(), Some(200));
        assert_eq!(
            record.response_body().unwrap().as_ref(),
            br#"{"id":"resp-1"}"#
        );
        assert!(!record.is_streaming());
        assert_eq!(record.state(), RecordState::Completed);
    }

    proxy.stop().await;
}

#[tokio::test]
async fn upstream_error_status_should_pass_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-request-id", "abc")
                .set_body_string("not here"),
        )
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&upstream.uri(), 10).await;
    let response = reqwest::get(proxy.url("/missing")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["x-request-id"], "abc");
    assert_eq!(response.text().await.unwrap(), "not here");

    proxy.wait_for_settled(1).await;
    {
        let history = proxy.history.read().unwrap();
        let record = history.get_by_index(1).unwrap();
        assert_eq!(record.response_status(), Some(404));
        assert_eq!(record.state(), RecordState::Completed);
    }
    proxy.stop().await;
}

#[tokio::test]
async fn unreachable_upstream_should_yield_502_and_failed_record() {
    let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", unused.local_addr().unwrap());
    drop(unused);

    let proxy = Harness::start(&dead, 10).await;
    let response = reqwest::get(proxy.url("/v1/models")).await.unwrap();
    assert_eq!(response.status(), 502);
    assert!(response.text().await.unwrap().starts_with("Bad Gateway: "));

    proxy.wait_for_settled(1).await;
    {
        let history = proxy.history.read().unwrap();
        let record = history.get_by_index(1).unwrap();
        assert_eq!(record.state(), RecordState::Failed);
        assert!(record.response_status().is_none());
        assert!(!record.error().unwrap().is_empty());
        assert_eq!(history.stats().failed, 1);
    }
    proxy.stop().await;
}

#[tokio::test]
async fn history_should_keep_only_most_recent_records() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&upstream.uri(), 2).await;
    for path in ["/a", "/b", "/c"] {
        let response = reqwest::get(proxy.url(path)).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
        // Sequential so ids follow request order
        proxy.wait_for_settled(1).await;
    }
    proxy.wait_for_settled(2).await;

    {
        let history = proxy.history.read().unwrap();
        let urls: Vec<_> = history.get_all().iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["/b", "/c"]);
        assert!(history.get_by_id(RecordId::new(1)).is_none());
        assert_eq!(history.get_by_index(1).unwrap().id(), RecordId::new(3));
    }
    proxy.stop().await;
}

#[tokio::test]
async fn concurrent_requests_should_get_distinct_ids() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&upstream.uri(), 50).await;
    let client = reqwest::Client::new();
    let requests = (0..10).map(|i| {
        let client = client.clone();
        let url = proxy.url(&format!("/item/{i}"));
        tokio::spawn(async move { client.get(url).send().await.unwrap().text().await.unwrap() })
    });
    for request in requests.collect::<Vec<_>>() {
        assert_eq!(request.await.unwrap(), "ok");
    }

    proxy.wait_for_settled(10).await;
    {
        let history = proxy.history.read().unwrap();
        let ids: Vec<_> = history.get_all().iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        let urls: HashSet<_> = history.get_all().iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls.len(), 10);
        assert_eq!(history.stats().completed, 10);
    }
    proxy.stop().await;
}

#[tokio::test]
async fn events_should_follow_lifecycle_order() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&upstream.uri(), 10).await;
    let mut events = proxy.bus.subscribe();
    reqwest::get(proxy.url("/hello"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let mut kinds = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        assert_eq!(event.record_id, RecordId::new(1));
        let terminal = matches!(
            event.kind,
            LogEventKind::Complete | LogEventKind::Error { .. }
        );
        kinds.push(event.kind.label());
        if terminal {
            break;
        }
    }

    assert_eq!(kinds.first(), Some(&"request"));
    assert_eq!(kinds.get(1), Some(&"response"));
    assert_eq!(kinds.last(), Some(&"complete"));
    assert!(kinds[2..kinds.len() - 1].iter().all(|kind| *kind == "chunk"));
    proxy.stop().await;
}

#[tokio::test]
async fn client_abort_before_upstream_answers_should_fail_the_record() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&upstream)
        .await;

    let proxy = Harness::start(&upstream.uri(), 10).await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    assert!(client.get(proxy.url("/slow")).send().await.is_err());

    proxy.wait_for_settled(1).await;
    {
        let history = proxy.history.read().unwrap();
        let record = history.get_by_index(1).unwrap();
        assert_eq!(record.state(), RecordState::Failed);
        assert_eq!(record.error(), Some("client disconnected"));
        assert!(record.response_status().is_none());
        assert_eq!(history.stats().pending, 0);
    }
    proxy.stop().await;
}

#[tokio::test]
async fn oversized_body_should_be_refused_without_a_record() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&upstream)
        .await;

    let proxy = Harness::start_with(&upstream.uri(), 10, |config| {
        config.max_body_bytes = 1024;
    })
    .await;
    // Fresh connection per request; the refused one may be closed unread
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    let response = client
        .post(proxy.url("/upload"))
        .body(vec![b'x'; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    let response = client
        .post(proxy.url("/upload"))
        .body("small")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "ok");

    proxy.wait_for_settled(1).await;
    {
        let history = proxy.history.read().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get_by_index(1).unwrap().id(), RecordId::new(1));
    }
    assert!(upstream
        .received_requests()
        .await
        .unwrap()
        .iter()
        .all(|request| request.body.len() < 1024));
    proxy.stop().await;
}

#[tokio::test]
async fn truncated_body_should_be_refused_without_a_record() {
    let upstream = MockServer::start().await;
    let proxy = Harness::start(&upstream.uri(), 10).await;

    // Promise 100 bytes, send 3, then stop writing
    let mut stream = tokio::net::TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nhost: localhost\r\ncontent-length: 100\r\n\r\nabc")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut answer = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut answer)).await;
    if !answer.is_empty() {
        assert!(String::from_utf8_lossy(&answer).starts_with("HTTP/1.1 400"));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(proxy.history.read().unwrap().is_empty());
    assert!(upstream.received_requests().await.unwrap().is_empty());
    proxy.stop().await;
}

//! Shared harness: a proxy on an ephemeral port feeding a real history

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tapline::config::ProxyConfig;
use tapline::events::{EventBus, SimpleEventBus};
use tapline::history::{shared_history, HistorySubscriber, RecordState, SharedHistory};
use tapline::proxy::ProxyServer;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    pub addr: SocketAddr,
    pub bus: Arc<dyn EventBus>,
    pub history: SharedHistory,
    pub shutdown: CancellationToken,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    /// Start a proxy forwarding to `upstream` with room for `capacity` records
    pub async fn start(upstream: &str, capacity: usize) -> Self {
        Self::start_with(upstream, capacity, |_| {}).await
    }

    /// Like [`Harness::start`], letting the test adjust the config first
    pub async fn start_with(
        upstream: &str,
        capacity: usize,
        configure: impl FnOnce(&mut ProxyConfig),
    ) -> Self {
        let mut config = ProxyConfig::new(8090, upstream, capacity).unwrap();
        config.port = 0;
        config.connect_timeout = Duration::from_secs(2);
        config.upstream_timeout = Duration::from_secs(10);
        configure(&mut config);

        let bus: Arc<dyn EventBus> = Arc::new(SimpleEventBus::new());
        let history = shared_history(capacity);
        HistorySubscriber::spawn(bus.as_ref(), Arc::clone(&history));

        let server = ProxyServer::bind(&config, Arc::clone(&bus)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(server.run(shutdown.clone(), Duration::from_secs(1)));

        Self {
            addr,
            bus,
            history,
            shutdown,
            server,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    /// Wait until `count` records exist and none is still pending
    pub async fn wait_for_settled(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            {
                let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
                let stats = history.stats();
                if stats.total >= count
                    && history
                        .get_all()
                        .iter()
                        .all(|record| record.state() != RecordState::Pending)
                {
                    return;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "history did not settle on {count} records"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.unwrap().unwrap();
    }
}

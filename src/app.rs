//! # Application Wiring
//!
//! Connects the event bus, history, proxy and console, and owns the
//! shutdown sequence.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::collapse::{CollapseRegistry, PatternStore};
use crate::config::ProxyConfig;
use crate::console::{stdin_lines, Console, ProxyInfo, TerminalTranscript, Theme};
use crate::events::{EventBus, SimpleEventBus};
use crate::history::{shared_history, HistorySubscriber};
use crate::proxy::ProxyServer;

/// Build the collapse registry from the pattern file
///
/// Problems are returned as notices for the console rather than aborting
/// startup.
pub fn load_collapse_patterns(
    store: &PatternStore,
    case_sensitive: bool,
) -> (CollapseRegistry, Vec<String>) {
    let mut notices = Vec::new();
    let saved = store.load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring collapse pattern file: {}", e);
        notices.push(format!("⚠️  Ignoring collapse pattern file: {e}"));
        Vec::new()
    });

    let (registry, rejected) = CollapseRegistry::with_patterns(case_sensitive, saved);
    for error in rejected {
        tracing::warn!("Skipping saved collapse pattern: {}", error);
        notices.push(format!("⚠️  Skipping saved collapse pattern: {error}"));
    }
    (registry, notices)
}

/// Run the proxy and console until exit is requested
pub async fn run(config: ProxyConfig) -> Result<()> {
    let bus: Arc<dyn EventBus> = Arc::new(SimpleEventBus::new());
    let history = shared_history(config.history_size);
    // Subscribe before the listener opens so no event is missed
    let history_task = HistorySubscriber::spawn(bus.as_ref(), Arc::clone(&history));
    let events = bus.subscribe();

    let store = PatternStore::new(&config.patterns_path);
    let (collapse, notices) = load_collapse_patterns(&store, config.collapse_case_sensitive);

    let server = ProxyServer::bind(&config, Arc::clone(&bus)).await?;
    let info = ProxyInfo {
        port: server.local_addr()?.port(),
        upstream: config.upstream.to_string(),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let mut console = Console::new(
        TerminalTranscript::stdout(),
        Arc::clone(&history),
        collapse,
        info,
        Theme::new(config.color),
    )
    .with_pattern_store(store);
    console.print_banner();
    console.print_lines(&notices);
    let console_task = tokio::spawn(console.run(stdin_lines(), events, shutdown.clone()));

    let served = server.run(shutdown.clone(), config.shutdown_grace).await;
    shutdown.cancel();

    match console_task.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!("Console stopped with error: {:#}", e),
        Err(e) => tracing::warn!("Console task ended abnormally: {}", e),
    }
    history_task.abort();
    tracing::info!("tapline stopped");
    served
}

/// Cancel `shutdown` on SIGINT (Ctrl+C) or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

//! # tapline Main Entry Point
//!
//! HTTP debugging proxy with a live command console.

use anyhow::Result;
use tapline::cmd_args::CommandLineArgs;
use tapline::config::{expand_path, get_log_path, ProxyConfig};
use tapline::{app, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommandLineArgs::parse();
    let config = ProxyConfig::from_args(&args)?;

    let _log_guard = logging::init(&expand_path(&get_log_path()), config.verbose);
    tracing::info!(
        "Starting tapline on {} forwarding to {}",
        config.listen_addr(),
        config.upstream
    );

    app::run(config).await?;

    println!("\n👋 Thanks for using tapline!");
    Ok(())
}

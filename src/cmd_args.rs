use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

pub use clap::Parser;

use crate::config::{
    DEFAULT_BIND_ADDR, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HISTORY_SIZE, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_PORT, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct ClapArgs {
    /// Local port the proxy listens on.
    /// Client applications must point at this port instead of the real API.
    #[clap(short = 'p', long, env = "PORT", default_value_t = DEFAULT_PORT, help = "listening port")]
    port: u16,

    /// Local address the proxy binds to.
    #[clap(long, default_value = DEFAULT_BIND_ADDR, help = "listening address")]
    bind: IpAddr,

    /// Upstream base URL. Request paths are appended unchanged.
    #[clap(short = 'u', long, default_value = DEFAULT_UPSTREAM_URL, help = "upstream base URL")]
    upstream: String,

    /// Maximum number of captured requests kept in history.
    #[clap(short = 'n', long, default_value_t = DEFAULT_HISTORY_SIZE, help = "history capacity")]
    history_size: usize,

    /// Collapse pattern file. Defaults to ~/.tapline/collapse-patterns.json.
    #[clap(long, help = "collapse pattern file")]
    patterns_file: Option<PathBuf>,

    /// Match collapse patterns case-insensitively.
    #[clap(long, help = "case-insensitive collapse patterns")]
    collapse_case_insensitive: bool,

    /// Disable colored console output.
    #[clap(long, help = "disable colors")]
    no_color: bool,

    /// Seconds allowed for connecting to the upstream.
    #[clap(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, help = "upstream connect timeout (s)")]
    connect_timeout: u64,

    /// Seconds allowed for a whole upstream exchange, body included.
    #[clap(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, help = "upstream timeout (s)")]
    upstream_timeout: u64,

    /// Seconds in-flight connections get to finish on shutdown.
    #[clap(long, default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS, help = "shutdown grace period (s)")]
    shutdown_grace: u64,

    /// Largest accepted request body in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_BODY_BYTES, help = "maximum request body size")]
    max_body_bytes: usize,

    /// Verbose mode
    /// Optional. Write debug-level diagnostics to the log file.
    #[clap(short = 'v', long, help = "Print verbose message")]
    verbose: bool,
}

#[derive(Debug, Clone)]
pub struct CommandLineArgs {
    port: u16,
    bind: IpAddr,
    upstream: String,
    history_size: usize,
    patterns_file: Option<PathBuf>,
    collapse_case_insensitive: bool,
    no_color: bool,
    connect_timeout: u64,
    upstream_timeout: u64,
    shutdown_grace: u64,
    max_body_bytes: usize,
    verbose: bool,
}

impl From<ClapArgs> for CommandLineArgs {
    fn from(args: ClapArgs) -> Self {
        Self {
            port: args.port,
            bind: args.bind,
            upstream: args.upstream,
            history_size: args.history_size,
            patterns_file: args.patterns_file,
            collapse_case_insensitive: args.collapse_case_insensitive,
            no_color: args.no_color,
            connect_timeout: args.connect_timeout,
            upstream_timeout: args.upstream_timeout,
            shutdown_grace: args.shutdown_grace,
            max_body_bytes: args.max_body_bytes,
            verbose: args.verbose,
        }
    }
}

impl CommandLineArgs {
    pub fn parse() -> Self {
        ClapArgs::parse().into()
    }

    pub fn parse_from<I, T>(itr: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        ClapArgs::parse_from(itr).into()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bind(&self) -> IpAddr {
        self.bind
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn patterns_file(&self) -> Option<&PathBuf> {
        self.patterns_file.as_ref()
    }

    pub fn collapse_case_insensitive(&self) -> bool {
        self.collapse_case_insensitive
    }

    pub fn no_color(&self) -> bool {
        self.no_color
    }

    pub fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    pub fn upstream_timeout(&self) -> u64 {
        self.upstream_timeout
    }

    pub fn shutdown_grace(&self) -> u64 {
        self.shutdown_grace
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

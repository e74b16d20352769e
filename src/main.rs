//! WebSocket chat server binary.
//!
//! Serves the landing page and the chat endpoint on one port.
//!
//! Usage:
//!   websocket-chat
//!   websocket-chat --port 8002
//!   websocket-chat --host 127.0.0.1 --max-connections 50
//!   websocket-chat --debug
//!
//! `RUST_LOG` overrides the default filter.

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::str::FromStr;

use tracing::info;
use tracing_subscriber::EnvFilter;
use websocket_chat::{Error, Result, Server, ServerConfig};

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
struct Args {
    debug: bool,
    host: Option<IpAddr>,
    port: Option<u16>,
    max_connections: Option<usize>,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug" => parsed.debug = true,
                "--host" => parsed.host = Some(value(&arg, args.next())?),
                "--port" => parsed.port = Some(value(&arg, args.next())?),
                "--max-connections" => parsed.max_connections = Some(value(&arg, args.next())?),
                other => return Err(Error::config(format!("Unknown argument: {other}"))),
            }
        }

        Ok(parsed)
    }

    fn config(&self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder();
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(limit) = self.max_connections {
            builder = builder.max_connections(limit);
        }
        builder.build()
    }
}

/// Parses the value following `flag`.
fn value<T: FromStr>(flag: &str, raw: Option<String>) -> Result<T> {
    let raw = raw.ok_or_else(|| Error::config(format!("{flag} requires a value")))?;
    raw.parse()
        .map_err(|_| Error::config(format!("Invalid value for {flag}: {raw}")))
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let default = if debug {
        "websocket_chat=debug"
    } else {
        "websocket_chat=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            std::process::exit(2);
        }
    };
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let server = Server::bind(args.config()?).await?;
    println!("Chat page: http://{}/", server.local_addr());
    println!("WebSocket: {}", server.ws_url());

    let handle = server.spawn();

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await?;

    info!("Interrupt received");
    handle.shutdown().await;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

//! Development CORS gateway.
//!
//! ```text
//!     Browser (localhost origin)
//!         │
//!         ▼
//!     ┌────────────────────────────────────────────┐
//!     │                CORS GATEWAY                 │
//!     │                                             │
//!     │  /health ──────────▶ liveness report        │
//!     │  OPTIONS rule path ─▶ gated pre-flight      │
//!     │  rule path ────────▶ origin check           │
//!     │                        │                    │
//!     │                        ▼                    │
//!     │                  rewrite + forward ─────────┼──▶ HTTPS upstream
//!     │                        │                    │
//!     │  ◀── CORS-decorated ◀──┘                    │
//!     │  OPTIONS elsewhere ─▶ open pre-flight       │
//!     └────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cors_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use cors_gateway::lifecycle::{signals, Shutdown};
use cors_gateway::observability::{logging, metrics};
use cors_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "cors-gateway")]
#[command(about = "CORS forwarding gateway for local front-end development", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override observability.log_level
    #[arg(long)]
    log_level: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.observability);
    tracing::info!(name = %config.name, "cors-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        allowed_origins = ?config.cors.allowed_origins,
        request_timeout_secs = config.upstream.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_listener(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

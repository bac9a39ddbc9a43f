//! Upload Proxy
//!
//! Secure ingestion front door for volume uploads, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    UPLOAD PROXY                      │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐   ┌─────────┐   ┌──────────┐            │
//!   ──────────────────┼─▶│   net   │──▶│  http   │──▶│  token   │ 400 / 401  │
//!                     │  │listener │   │ server  │   │validator │            │
//!                     │  └─────────┘   └─────────┘   └────┬─────┘            │
//!                     │                                   ▼                  │
//!                     │                             ┌──────────┐  state      │
//!                     │                             │ resolver │◀─provider   │
//!                     │                             └────┬─────┘ 404/400/503 │
//!                     │                                  ▼                   │
//!   Client Response   │  ┌─────────┐   ┌─────────┐   ┌──────────┐            │
//!   ◀─────────────────┼──│response │◀──│  proxy  │◀─▶│   tls    │◀─ mTLS ────┼── Upload
//!                     │  │ relay   │   │ handler │   │ clients  │  502/503   │   Worker
//!                     │  └─────────┘   └─────────┘   └──────────┘            │
//!                     │                                                      │
//!                     │  config · lifecycle · observability                  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use upload_proxy::config::{self, ProxyConfig};
use upload_proxy::lifecycle;
use upload_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "upload-proxy")]
#[command(about = "Authenticating mTLS proxy for volume uploads", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);

    // Both ring and aws-lc-rs are linked; the process default must be explicit.
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upload-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        state_api = %config.state.api_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "Fatal startup error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! udp-relay liveness monitor CLI
//!
//! ```bash
//! udp-relay-monitor --config relay.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use udp_relay::{logging, RelayConfig};
use udp_relay_monitor::Monitor;

/// udp-relay liveness monitor
#[derive(Parser, Debug)]
#[command(name = "udp-relay-monitor")]
#[command(about = "Ping udp-relay and serve its health over HTTP")]
#[command(version)]
struct Args {
    /// Relay configuration file path
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides `verbose`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = RelayConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    // The log file belongs to the relay
    logging::init(config.verbose, args.log_level.as_deref(), None)
        .context("failed to initialise logging")?;

    info!("udp-relay-monitor v{}", env!("CARGO_PKG_VERSION"));

    let monitor = Monitor::from_config(&config)
        .await
        .context("failed to start monitor")?;

    monitor
        .run(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
        .context("monitor failed")?;
    Ok(())
}

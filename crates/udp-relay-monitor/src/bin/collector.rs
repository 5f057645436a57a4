// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! udp-relay and its monitor in one process
//!
//! ```bash
//! udp-collector --config relay.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use udp_relay::{logging, RelayConfig};
use udp_relay_monitor::Collector;

/// Relay plus liveness monitor
#[derive(Parser, Debug)]
#[command(name = "udp-collector")]
#[command(about = "Run udp-relay and its liveness monitor from one configuration")]
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

    logging::init(
        config.verbose,
        args.log_level.as_deref(),
        config.log_file().as_deref(),
    )
    .context("failed to open log file")?;

    info!("udp-collector v{}", env!("CARGO_PKG_VERSION"));

    let collector = Collector::from_config(&config)
        .await
        .context("failed to start collector")?;

    collector
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("unable to listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("collector failed")?;
    Ok(())
}

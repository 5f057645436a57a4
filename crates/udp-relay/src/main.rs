// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP telemetry relay CLI
//!
//! # Usage
//!
//! ```bash
//! # Run the relay
//! udp-relay --config relay.json
//!
//! # Write an example configuration
//! udp-relay gen-config --output relay.json
//!
//! # Check a configuration file
//! udp-relay validate --config relay.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use udp_relay::{logging, Listener, RelayConfig};

/// UDP to STOMP telemetry relay
#[derive(Parser, Debug)]
#[command(name = "udp-relay")]
#[command(about = "Relay JSON telemetry datagrams from UDP to a STOMP broker")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides `verbose`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "relay.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config_path = args.config.context("missing --config")?;
    let config = RelayConfig::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    logging::init(
        config.verbose,
        args.log_level.as_deref(),
        config.log_file().as_deref(),
    )
    .context("failed to open log file")?;

    info!("udp-relay v{}", env!("CARGO_PKG_VERSION"));

    let listener = Listener::from_config(&config)
        .await
        .context("failed to start listener")?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("unable to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    };

    listener.run(shutdown).await.context("listener failed")?;
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&RelayConfig::example())?;
    std::fs::write(&output, format!("{}\n", json))
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    match RelayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen:   udp://{}", config.listen_addr());
            println!("Monitor:  {}", config.monitor_url());
            match config.broker() {
                Some(broker) => println!(
                    "Broker:   {} -> {} ({} attempts)",
                    broker.uri, broker.destination, broker.max_attempts
                ),
                None => println!("Broker:   not configured, forwarding disabled"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness monitor for `udp-relay`
//!
//! Sends `ping` datagrams to the relay on a fixed interval. The relay answers
//! each one out of band with an HTTP `POST /` carrying `pong`, which updates
//! the last-contact time. `GET /health` fails once that time is older than
//! three intervals.
//!
//! # Quick Start
//!
//! ```bash
//! # Uses port, monitorPort and monitorInterval from the relay config
//! udp-relay-monitor --config relay.json
//!
//! curl http://localhost:9330/health
//!
//! # Or relay and monitor together
//! udp-collector --config relay.json
//! ```

pub mod collector;
pub mod http;
pub mod liveness;
pub mod metrics;
pub mod pinger;

pub use collector::{Collector, CollectorError};
pub use liveness::{Health, Liveness, STALENESS_FACTOR};
pub use metrics::{MonitorStats, MonitorStatsSnapshot};
pub use pinger::Pinger;

use http::AppState;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use udp_relay::{ConfigError, RelayConfig};

/// Monitor errors.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pinger plus HTTP server sharing one [`Liveness`].
pub struct Monitor {
    listener: TcpListener,
    pinger: Pinger,
    state: Arc<AppState>,
}

impl Monitor {
    /// Bind using the relay configuration.
    pub async fn from_config(config: &RelayConfig) -> Result<Self, MonitorError> {
        Self::bind(
            config.monitor_bind_addr(),
            config.ping_target(),
            config.monitor_interval(),
        )
        .await
    }

    /// Bind the HTTP server on `http_addr` and a pinger aimed at `relay`.
    pub async fn bind(
        http_addr: SocketAddr,
        relay: SocketAddr,
        interval: Duration,
    ) -> Result<Self, MonitorError> {
        if interval.is_zero() {
            return Err(ConfigError::Invalid("monitorInterval cannot be 0".into()).into());
        }
        let listener = TcpListener::bind(http_addr).await?;
        let pinger = Pinger::bind(relay, interval).await?;
        let state = Arc::new(AppState {
            liveness: Arc::new(Liveness::new()),
            stats: Arc::new(MonitorStats::new()),
            interval,
        });
        Ok(Self {
            listener,
            pinger,
            state,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn liveness(&self) -> Arc<Liveness> {
        self.state.liveness.clone()
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.state.stats.clone()
    }

    /// Serve until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<(), MonitorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.listener.local_addr()?;
        info!(
            "monitor listening on http://{}, pinging udp://{} every {:?}",
            addr,
            self.pinger.target(),
            self.state.interval
        );

        let pinger = tokio::spawn(self.pinger.run(self.state.stats.clone()));
        let app = http::router(self.state);
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await;
        pinger.abort();

        info!("monitor stopped");
        result.map_err(MonitorError::from)
    }
}

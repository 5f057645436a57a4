// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay and monitor in one process.
//!
//! Both halves run on their own task and stop together: on the shutdown
//! signal, or as soon as either of them returns.

use crate::{Monitor, MonitorError};
use std::future::Future;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info};
use udp_relay::{
    Connector, HttpNotifier, Listener, ListenerStatsSnapshot, Notifier, RelayConfig, RelayError,
    StompConnector,
};

/// Collector errors.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("relay failed: {0}")]
    Relay(#[from] RelayError),

    #[error("monitor failed: {0}")]
    Monitor(#[from] MonitorError),

    #[error("task failed: {0}")]
    Task(#[from] JoinError),
}

/// A relay [`Listener`] and its [`Monitor`].
pub struct Collector<C: Connector, N: Notifier> {
    relay: Listener<C, N>,
    monitor: Monitor,
}

impl Collector<StompConnector, HttpNotifier> {
    /// Start both halves from one relay configuration.
    pub async fn from_config(config: &RelayConfig) -> Result<Self, CollectorError> {
        let relay = Listener::from_config(config).await?;
        let monitor = Monitor::from_config(config).await?;
        Ok(Self::new(relay, monitor))
    }
}

impl<C, N> Collector<C, N>
where
    C: Connector + 'static,
    N: Notifier + 'static,
{
    pub fn new(relay: Listener<C, N>, monitor: Monitor) -> Self {
        Self { relay, monitor }
    }

    /// Run until `shutdown` completes or either half stops.
    ///
    /// Returns the relay counters when both halves stopped cleanly.
    pub async fn run<F>(self, shutdown: F) -> Result<ListenerStatsSnapshot, CollectorError>
    where
        F: Future<Output = ()> + Send,
    {
        let (stop, stopped) = watch::channel(false);
        let mut relay = tokio::spawn(self.relay.run(wait_for_stop(stopped.clone())));
        let mut monitor = tokio::spawn(self.monitor.run(wait_for_stop(stopped)));

        let mut relay_done = None;
        let mut monitor_done = None;
        tokio::pin!(shutdown);
        tokio::select! {
            _ = &mut shutdown => info!("shutting down collector"),
            result = &mut relay => {
                error!("relay stopped, stopping monitor");
                relay_done = Some(result);
            }
            result = &mut monitor => {
                error!("monitor stopped, stopping relay");
                monitor_done = Some(result);
            }
        }
        let _ = stop.send(true);

        let relay_result = match relay_done {
            Some(result) => result,
            None => relay.await,
        };
        let monitor_result = match monitor_done {
            Some(result) => result,
            None => monitor.await,
        };

        let stats = relay_result??;
        monitor_result??;
        Ok(stats)
    }
}

async fn wait_for_stop(mut stopped: watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = stopped.wait_for(|stop| *stop).await;
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic UDP `ping` to the relay.

use crate::metrics::MonitorStats;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};
use udp_relay::transform::PING;

/// Sends `ping` to the relay every interval. No reply is read.
#[derive(Debug)]
pub struct Pinger {
    socket: UdpSocket,
    target: SocketAddr,
    interval: Duration,
}

impl Pinger {
    /// Bind an ephemeral socket of the target's address family.
    pub async fn bind(target: SocketAddr, interval: Duration) -> io::Result<Self> {
        let local = match target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            target,
            interval,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one `ping`.
    pub async fn ping_once(&self) -> io::Result<()> {
        self.socket.send_to(PING, self.target).await.map(|_| ())
    }

    /// Ping forever, first after one interval.
    pub async fn run(self, stats: Arc<MonitorStats>) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        loop {
            ticker.tick().await;
            match self.ping_once().await {
                Ok(()) => {
                    stats.pings_sent.fetch_add(1, Ordering::Relaxed);
                    debug!("ping sent to {}", self.target);
                }
                Err(err) => {
                    stats.ping_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("unable to ping relay at {}: {}", self.target, err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_once() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let pinger = Pinger::bind(relay.local_addr().unwrap(), Duration::from_secs(10))
            .await
            .unwrap();

        pinger.ping_once().await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = relay.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[tokio::test]
    async fn test_run_pings_periodically() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let pinger = Pinger::bind(relay.local_addr().unwrap(), Duration::from_millis(20))
            .await
            .unwrap();
        let stats = Arc::new(MonitorStats::new());
        let task = tokio::spawn(pinger.run(stats.clone()));

        let mut buf = [0u8; 16];
        for _ in 0..3 {
            let (n, _) = tokio::time::timeout(Duration::from_secs(5), relay.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..n], b"ping");
        }
        task.abort();
        assert!(stats.pings_sent.load(Ordering::Relaxed) >= 3);
    }
}

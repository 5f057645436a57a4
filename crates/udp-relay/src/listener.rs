// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP listener.
//!
//! A single sequential receive loop: each datagram is classified, then
//! answered, forwarded or dropped before the next one is read. A slow broker
//! therefore backs up into the kernel socket queue instead of an
//! application queue.

use crate::buffer::{AdaptiveBuffer, BufferExhausted};
use crate::config::{ConfigError, RelayConfig};
use crate::forward::{Connector, ForwardingEngine, SendOutcome};
use crate::notify::{HttpNotifier, NotifyError, Notifier};
use crate::stomp::StompConnector;
use crate::transform::{self, truncate_for_log, Classified, TransformError, MAX_LOGGED_PAYLOAD};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Fatal listener errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    #[error("{0}")]
    BufferExhausted(#[from] BufferExhausted),
}

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `ping` answered with a `pong` notification.
    Notified,
    /// Data packet delivered to the broker.
    Forwarded,
    /// Data packet dropped after the last broker attempt.
    Dropped,
    /// Data packet transformed but forwarding is disabled, either by
    /// configuration or because the startup connection failed.
    Unrouted,
    /// Datagram did not fit; the buffer grew to `new_size`.
    Truncated { new_size: usize },
    /// Not a JSON object.
    Malformed,
    /// Packet could not be re-encoded.
    Unencodable,
    /// Socket read failed.
    ReadError,
}

/// Listener counters.
#[derive(Debug)]
pub struct ListenerStats {
    pub datagrams: AtomicU64,
    pub pings: AtomicU64,
    pub forwarded: AtomicU64,
    pub dropped: AtomicU64,
    pub unrouted: AtomicU64,
    pub truncated: AtomicU64,
    pub malformed: AtomicU64,
    pub read_errors: AtomicU64,
    pub created: Instant,
}

impl Default for ListenerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerStats {
    pub fn new() -> Self {
        Self {
            datagrams: AtomicU64::new(0),
            pings: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            unrouted: AtomicU64::new(0),
            truncated: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    fn record(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Notified => &self.pings,
            Disposition::Forwarded => &self.forwarded,
            Disposition::Dropped => &self.dropped,
            Disposition::Unrouted => &self.unrouted,
            Disposition::Truncated { .. } => &self.truncated,
            Disposition::Malformed | Disposition::Unencodable => &self.malformed,
            Disposition::ReadError => &self.read_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of [`ListenerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub datagrams: u64,
    pub pings: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub unrouted: u64,
    pub truncated: u64,
    pub malformed: u64,
    pub read_errors: u64,
    pub uptime_secs: u64,
}

/// The UDP receive loop and everything it owns.
pub struct Listener<C: Connector, N: Notifier> {
    socket: UdpSocket,
    buffer: AdaptiveBuffer,
    forwarder: Option<ForwardingEngine<C>>,
    notifier: N,
    stats: Arc<ListenerStats>,
}

impl Listener<StompConnector, HttpNotifier> {
    /// Build the production listener: bind the socket, connect to the broker
    /// when one is configured, and notify the monitor over HTTP.
    pub async fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let notifier = HttpNotifier::new(config.monitor_url())?;

        let forwarder = match config.broker() {
            Some(settings) => {
                let connector = StompConnector::new(settings.clone());
                Some(ForwardingEngine::start(connector, &settings).await)
            }
            None => {
                info!("broker settings incomplete, forwarding disabled");
                None
            }
        };

        Self::bind(config.listen_addr(), config.buf_size, forwarder, notifier).await
    }
}

impl<C: Connector, N: Notifier> Listener<C, N> {
    /// Bind the UDP socket.
    pub async fn bind(
        addr: SocketAddr,
        buf_size: usize,
        forwarder: Option<ForwardingEngine<C>>,
        notifier: N,
    ) -> Result<Self, RelayError> {
        if buf_size == 0 {
            return Err(ConfigError::Invalid("bufSize cannot be 0".into()).into());
        }
        let socket = UdpSocket::bind(addr).await?;
        info!("listening on udp://{}", socket.local_addr()?);
        Ok(Self {
            socket,
            buffer: AdaptiveBuffer::new(buf_size),
            forwarder,
            notifier,
            stats: Arc::new(ListenerStats::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Current receive buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer.size()
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        self.stats.clone()
    }

    pub fn forwarder(&self) -> Option<&ForwardingEngine<C>> {
        self.forwarder.as_ref()
    }

    /// Receive and handle one datagram.
    pub async fn recv_once(&mut self) -> Result<Disposition, RelayError> {
        let received = self.socket.recv_from(self.buffer.as_mut_slice()).await;
        self.handle(received).await
    }

    /// Run until `shutdown` completes or a fatal error occurs.
    ///
    /// The broker connection is closed on both paths.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ListenerStatsSnapshot, RelayError>
    where
        F: Future<Output = ()>,
    {
        let result = self.serve(shutdown).await;
        if let Some(forwarder) = self.forwarder.as_mut() {
            forwarder.close().await;
        }

        let stats = self.stats.snapshot();
        info!(
            "listener stopped: {} datagrams, {} pings, {} forwarded, {} dropped, {} unrouted, {} truncated, {} malformed, {} read errors",
            stats.datagrams,
            stats.pings,
            stats.forwarded,
            stats.dropped,
            stats.unrouted,
            stats.truncated,
            stats.malformed,
            stats.read_errors
        );
        result.map(|()| stats)
    }

    async fn serve<F>(&mut self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            // Shutdown is only observed between datagrams
            let received = tokio::select! {
                _ = &mut shutdown => return Ok(()),
                received = self.socket.recv_from(self.buffer.as_mut_slice()) => received,
            };
            self.handle(received).await?;
        }
    }

    async fn handle(
        &mut self,
        received: io::Result<(usize, SocketAddr)>,
    ) -> Result<Disposition, RelayError> {
        let disposition = match received {
            Ok((len, from)) => {
                self.stats.datagrams.fetch_add(1, Ordering::Relaxed);
                self.process(len, from).await?
            }
            Err(err) => {
                warn!("UDP read error: {}", err);
                Disposition::ReadError
            }
        };
        self.stats.record(disposition);
        Ok(disposition)
    }

    async fn process(&mut self, len: usize, from: SocketAddr) -> Result<Disposition, RelayError> {
        let classified = transform::classify(self.buffer.filled(len));
        match classified {
            Classified::Ping => {
                debug!("ping from {}", from);
                if let Err(err) = self.notifier.notify_pong().await {
                    warn!("unable to notify monitor: {}", err);
                }
                Ok(Disposition::Notified)
            }
            Classified::Truncated => match self.buffer.grow() {
                Ok(new_size) => {
                    warn!(
                        "datagram from {} truncated at {} bytes, buffer grown to {}",
                        from, len, new_size
                    );
                    Ok(Disposition::Truncated { new_size })
                }
                Err(err) => {
                    error!("datagram from {} truncated at {} bytes: {}", from, len, err);
                    Err(err.into())
                }
            },
            Classified::Malformed(err) => {
                let raw = String::from_utf8_lossy(self.buffer.filled(len));
                warn!(
                    "unable to parse datagram from {}: {}, data {}",
                    from,
                    err,
                    truncate_for_log(&raw, MAX_LOGGED_PAYLOAD)
                );
                Ok(Disposition::Malformed)
            }
            Classified::Packet(packet) => {
                debug!("received {} bytes from {}", len, from);
                match transform::transform(packet) {
                    Ok(bytes) => Ok(self.forward(&bytes).await),
                    Err(TransformError::Encode { source, dump }) => {
                        error!("unable to encode packet: {}, data {}", source, dump);
                        Ok(Disposition::Unencodable)
                    }
                }
            }
        }
    }

    async fn forward(&mut self, bytes: &[u8]) -> Disposition {
        let Some(forwarder) = self.forwarder.as_mut() else {
            debug!("forwarding disabled, dropping {} bytes", bytes.len());
            return Disposition::Unrouted;
        };
        match forwarder.send(bytes).await {
            SendOutcome::Delivered { .. } => Disposition::Forwarded,
            SendOutcome::Dropped { .. } => Disposition::Dropped,
            SendOutcome::Disabled => {
                debug!("no broker connection, dropping {} bytes", bytes.len());
                Disposition::Unrouted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::BrokerConnection;
    use crate::stomp::StompError;
    use std::sync::atomic::AtomicU32;

    struct NullConnection;

    impl BrokerConnection for NullConnection {
        async fn send(&mut self, _: &str, _: &str, _: &[u8]) -> Result<(), StompError> {
            Ok(())
        }

        async fn disconnect(self) {}
    }

    struct NullConnector;

    impl Connector for NullConnector {
        type Connection = NullConnection;

        async fn connect(&self) -> Result<NullConnection, StompError> {
            Ok(NullConnection)
        }
    }

    #[derive(Clone, Default)]
    struct CountingNotifier(Arc<AtomicU32>);

    impl Notifier for CountingNotifier {
        async fn notify_pong(&self) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    async fn listener(buf_size: usize) -> (Listener<NullConnector, CountingNotifier>, UdpSocket) {
        let listener = Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            buf_size,
            None,
            CountingNotifier::default(),
        )
        .await
        .unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        (listener, sender)
    }

    #[tokio::test]
    async fn test_zero_buffer_rejected() {
        let result = Listener::<NullConnector, _>::bind(
            "127.0.0.1:0".parse().unwrap(),
            0,
            None,
            CountingNotifier::default(),
        )
        .await;
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[tokio::test]
    async fn test_ping_notifies() {
        let (mut listener, sender) = listener(1024).await;
        let count = listener.notifier.0.clone();

        sender.send(b"ping").await.unwrap();
        assert_eq!(listener.recv_once().await.unwrap(), Disposition::Notified);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(listener.stats().snapshot().pings, 1);
    }

    #[tokio::test]
    async fn test_without_forwarder_packets_are_unrouted() {
        let (mut listener, sender) = listener(1024).await;
        sender.send(br#"{"type":"x"}"#).await.unwrap();
        assert_eq!(listener.recv_once().await.unwrap(), Disposition::Unrouted);
    }

    #[tokio::test]
    async fn test_truncation_grows_buffer() {
        let (mut listener, sender) = listener(4).await;
        sender.send(br#"{"key":"value"}"#).await.unwrap();

        assert_eq!(
            listener.recv_once().await.unwrap(),
            Disposition::Truncated { new_size: 8 }
        );
        assert_eq!(listener.buffer_size(), 8);
    }

    #[tokio::test]
    async fn test_malformed_keeps_buffer() {
        let (mut listener, sender) = listener(64).await;
        sender.send(b"{not json").await.unwrap();
        assert_eq!(listener.recv_once().await.unwrap(), Disposition::Malformed);
        assert_eq!(listener.buffer_size(), 64);
        assert_eq!(listener.stats().snapshot().malformed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (listener, sender) = listener(64).await;
        sender.send(b"ping").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let stats = listener.stats();
        let run = listener.run(async {
            let _ = rx.await;
        });
        let stop = async {
            while stats.snapshot().pings == 0 {
                tokio::task::yield_now().await;
            }
            let _ = tx.send(());
        };
        let (result, ()) = tokio::join!(run, stop);
        let snapshot = result.unwrap();
        assert_eq!(snapshot.pings, 1);
        assert_eq!(snapshot.datagrams, 1);
    }

    #[tokio::test]
    async fn test_run_can_be_spawned() {
        let (listener, sender) = listener(64).await;
        let stats = listener.stats();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(listener.run(async {
            let _ = rx.await;
        }));

        sender.send(b"ping").await.unwrap();
        while stats.snapshot().pings == 0 {
            tokio::task::yield_now().await;
        }
        let _ = tx.send(());
        let snapshot = task.await.unwrap().unwrap();
        assert_eq!(snapshot.pings, 1);
    }

    #[tokio::test]
    async fn test_run_with_forwarder_closes_connection() {
        let settings = crate::config::BrokerSettings {
            uri: "null:0".into(),
            login: "l".into(),
            password: "p".into(),
            destination: "/queue/x".into(),
            content_type: "application/json".into(),
            max_attempts: 1,
            heartbeat: Default::default(),
        };
        let forwarder = ForwardingEngine::start(NullConnector, &settings).await;
        let listener = Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            64,
            Some(forwarder),
            CountingNotifier::default(),
        )
        .await
        .unwrap();
        assert!(listener.forwarder().is_some_and(|f| f.is_connected()));

        let stats = listener.run(async {}).await.unwrap();
        assert_eq!(stats.datagrams, 0);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Forwarding engine: bounded retry with reconnect.
//!
//! The engine owns at most one broker connection. A failed send tears the
//! connection down and opens a fresh one before the next attempt. After the
//! last attempt the packet is logged and dropped; nothing is queued.
//!
//! If the broker cannot be reached at startup the engine stays disabled for
//! the life of the process and every send is a no-op.

use crate::config::BrokerSettings;
use crate::stomp::StompError;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// A connection able to deliver packets to the broker.
pub trait BrokerConnection: Send {
    /// Send one packet to `destination`.
    fn send(
        &mut self,
        destination: &str,
        content_type: &str,
        body: &[u8],
    ) -> impl Future<Output = Result<(), StompError>> + Send;

    /// Close the connection.
    fn disconnect(self) -> impl Future<Output = ()> + Send;
}

/// Factory for broker connections using fixed credentials.
pub trait Connector: Send + Sync {
    type Connection: BrokerConnection;

    /// Open a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, StompError>> + Send;
}

/// Result of [`ForwardingEngine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered on attempt `attempts`.
    Delivered { attempts: u32 },
    /// Every attempt failed; the packet is lost.
    Dropped { attempts: u32 },
    /// The startup connection failed, so nothing was attempted.
    Disabled,
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Forwarding counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Packets delivered.
    pub delivered: u64,
    /// Packets dropped after the last attempt.
    pub dropped: u64,
    /// Failed individual attempts.
    pub failed_attempts: u64,
    /// Reconnects tried.
    pub reconnects: u64,
    /// Reconnects that failed.
    pub reconnect_failures: u64,
}

/// Sole owner and writer of the broker connection.
pub struct ForwardingEngine<C: Connector> {
    connector: C,
    connection: Option<C::Connection>,
    destination: String,
    content_type: String,
    max_attempts: u32,
    enabled: bool,
    stats: ForwardStats,
}

impl<C: Connector> ForwardingEngine<C> {
    fn new(connector: C, settings: &BrokerSettings) -> Self {
        Self {
            connector,
            connection: None,
            destination: settings.destination.clone(),
            content_type: settings.content_type.clone(),
            max_attempts: settings.max_attempts.max(1),
            enabled: false,
            stats: ForwardStats::default(),
        }
    }

    /// Create an engine and make the startup connection.
    ///
    /// A failed connection is not fatal, but the engine is then disabled:
    /// sends return [`SendOutcome::Disabled`] without touching the broker.
    pub async fn start(connector: C, settings: &BrokerSettings) -> Self {
        let mut engine = Self::new(connector, settings);
        match engine.connector.connect().await {
            Ok(conn) => {
                info!("connected to broker {}", settings.uri);
                engine.connection = Some(conn);
                engine.enabled = true;
            }
            Err(err) => {
                warn!(
                    "Unable to connect to broker {}: {}, forwarding disabled",
                    settings.uri, err
                );
            }
        }
        engine
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the startup connection succeeded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Destination packets are sent to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn stats(&self) -> ForwardStats {
        self.stats
    }

    /// Deliver `payload`, retrying up to the configured attempt count.
    ///
    /// A connection lost mid-run counts as a failed attempt and is replaced.
    pub async fn send(&mut self, payload: &[u8]) -> SendOutcome {
        if !self.enabled {
            return SendOutcome::Disabled;
        }
        for attempt in 1..=self.max_attempts {
            let result = match self.connection.as_mut() {
                Some(conn) => {
                    conn.send(&self.destination, &self.content_type, payload)
                        .await
                }
                None => Err(StompError::NotConnected),
            };

            let err = match result {
                Ok(()) => {
                    debug!("sent data to broker destination {}", self.destination);
                    self.stats.delivered += 1;
                    return SendOutcome::Delivered { attempts: attempt };
                }
                Err(err) => err,
            };

            self.stats.failed_attempts += 1;
            if attempt == self.max_attempts {
                error!(
                    "unable to send data to {}, data {}, error {}, attempt {}",
                    self.destination,
                    String::from_utf8_lossy(payload),
                    err,
                    attempt
                );
                self.stats.dropped += 1;
                return SendOutcome::Dropped { attempts: attempt };
            }

            warn!(
                "unable to send data to {}, error {}, attempt {}",
                self.destination, err, attempt
            );
            self.reconnect().await;
        }

        // max_attempts >= 1, so the loop always returns
        SendOutcome::Dropped {
            attempts: self.max_attempts,
        }
    }

    /// Replace the connection with a fresh one, or with none if connecting
    /// fails.
    async fn reconnect(&mut self) {
        if let Some(old) = self.connection.take() {
            old.disconnect().await;
        }
        self.stats.reconnects += 1;
        self.connection = match self.connector.connect().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                self.stats.reconnect_failures += 1;
                warn!("Unable to reconnect to broker: {}", err);
                None
            }
        };
    }

    /// Disconnect at shutdown.
    pub async fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.disconnect().await;
            info!("disconnected from broker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Script {
        /// Outcome of each send, in order; `true` succeeds. Empty: succeed.
        sends: VecDeque<bool>,
        /// Outcome of each connect, in order. Empty: succeed.
        connects: VecDeque<bool>,
        delivered: Vec<Vec<u8>>,
        connect_calls: u32,
        disconnects: u32,
    }

    struct MockConnection(Arc<Mutex<Script>>);

    impl BrokerConnection for MockConnection {
        async fn send(&mut self, _: &str, _: &str, body: &[u8]) -> Result<(), StompError> {
            let mut script = self.0.lock().unwrap();
            if script.sends.pop_front().unwrap_or(true) {
                script.delivered.push(body.to_vec());
                Ok(())
            } else {
                Err(StompError::Closed("scripted failure".into()))
            }
        }

        async fn disconnect(self) {
            self.0.lock().unwrap().disconnects += 1;
        }
    }

    struct MockConnector(Arc<Mutex<Script>>);

    impl Connector for MockConnector {
        type Connection = MockConnection;

        async fn connect(&self) -> Result<MockConnection, StompError> {
            let mut script = self.0.lock().unwrap();
            script.connect_calls += 1;
            if script.connects.pop_front().unwrap_or(true) {
                Ok(MockConnection(self.0.clone()))
            } else {
                Err(StompError::Timeout("mock".into()))
            }
        }
    }

    fn settings(max_attempts: u32) -> BrokerSettings {
        BrokerSettings {
            uri: "mock:61613".into(),
            login: "user".into(),
            password: "pass".into(),
            destination: "/topic/test".into(),
            content_type: "application/json".into(),
            max_attempts,
            heartbeat: Default::default(),
        }
    }

    fn engine(script: &Arc<Mutex<Script>>, max_attempts: u32) -> ForwardingEngine<MockConnector> {
        ForwardingEngine::new(MockConnector(script.clone()), &settings(max_attempts))
    }

    #[tokio::test]
    async fn test_start_connects() {
        let script = Arc::new(Mutex::new(Script::default()));
        let engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;
        assert!(engine.is_connected());
        assert_eq!(script.lock().unwrap().connect_calls, 1);
    }

    #[tokio::test]
    async fn test_failed_start_disables_forwarding() {
        let script = Arc::new(Mutex::new(Script {
            connects: VecDeque::from([false]),
            ..Default::default()
        }));
        let mut engine =
            ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;
        assert!(!engine.is_connected());
        assert!(!engine.is_enabled());

        // The broker would accept now, but no attempt is made
        assert_eq!(engine.send(b"{}").await, SendOutcome::Disabled);
        assert_eq!(engine.send(b"{}").await, SendOutcome::Disabled);

        let script = script.lock().unwrap();
        assert_eq!(script.connect_calls, 1);
        assert!(script.delivered.is_empty());
        assert_eq!(engine.stats(), ForwardStats::default());
    }

    #[tokio::test]
    async fn test_lost_connection_is_reestablished() {
        let script = Arc::new(Mutex::new(Script {
            connects: VecDeque::from([true, false, true]),
            sends: VecDeque::from([false]),
            ..Default::default()
        }));
        let mut engine =
            ForwardingEngine::start(MockConnector(script.clone()), &settings(2)).await;
        assert!(engine.is_enabled());

        // Send fails, reconnect fails: the packet is dropped with no connection held
        assert_eq!(engine.send(b"a").await, SendOutcome::Dropped { attempts: 2 });
        assert!(!engine.is_connected());

        // Still enabled: the missing connection fails attempt 1, the reconnect
        // succeeds and attempt 2 delivers
        assert_eq!(
            engine.send(b"b").await,
            SendOutcome::Delivered { attempts: 2 }
        );
        assert_eq!(script.lock().unwrap().delivered, vec![b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let script = Arc::new(Mutex::new(Script::default()));
        let mut engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;

        let outcome = engine.send(b"{\"a\":1}").await;
        assert_eq!(outcome, SendOutcome::Delivered { attempts: 1 });
        assert_eq!(script.lock().unwrap().delivered, vec![b"{\"a\":1}".to_vec()]);
        assert_eq!(engine.stats().reconnects, 0);
    }

    #[tokio::test]
    async fn test_k_minus_one_failures_then_success() {
        let max_attempts = 5;
        for k in 1..=max_attempts {
            let mut sends: VecDeque<bool> = (1..k).map(|_| false).collect();
            sends.push_back(true);
            let script = Arc::new(Mutex::new(Script {
                sends,
                ..Default::default()
            }));
            let mut engine =
                ForwardingEngine::start(MockConnector(script.clone()), &settings(max_attempts))
                    .await;

            let outcome = engine.send(b"payload").await;
            assert_eq!(outcome, SendOutcome::Delivered { attempts: k });

            let script = script.lock().unwrap();
            assert_eq!(script.delivered.len(), 1);
            // One initial connect plus one reconnect per failure
            assert_eq!(script.connect_calls, k);
            assert_eq!(engine.stats().reconnects, u64::from(k - 1));
            // Each replaced connection was disconnected first
            assert_eq!(script.disconnects, k - 1);
        }
    }

    #[tokio::test]
    async fn test_exhausted_attempts_drop() {
        let script = Arc::new(Mutex::new(Script {
            sends: VecDeque::from([false, false, false, true]),
            ..Default::default()
        }));
        let mut engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;

        let outcome = engine.send(b"lost").await;
        assert_eq!(outcome, SendOutcome::Dropped { attempts: 3 });
        assert!(script.lock().unwrap().delivered.is_empty());
        // No reconnect after the final attempt
        assert_eq!(engine.stats().reconnects, 2);
        assert_eq!(engine.stats().dropped, 1);
        assert_eq!(engine.stats().failed_attempts, 3);

        // The next packet uses the fourth scripted send
        assert!(engine.send(b"next").await.is_delivered());
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_replaced_by_none() {
        let script = Arc::new(Mutex::new(Script {
            sends: VecDeque::from([false]),
            connects: VecDeque::from([true, false, true]),
            ..Default::default()
        }));
        let mut engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;

        // attempt 1 fails, reconnect fails, attempt 2 fails (no connection),
        // reconnect succeeds, attempt 3 delivers
        let outcome = engine.send(b"x").await;
        assert_eq!(outcome, SendOutcome::Delivered { attempts: 3 });
        assert_eq!(engine.stats().reconnect_failures, 1);
        assert_eq!(engine.stats().reconnects, 2);
        // Only the first connection existed to be disconnected
        assert_eq!(script.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_single_attempt_never_reconnects() {
        let script = Arc::new(Mutex::new(Script {
            sends: VecDeque::from([false]),
            ..Default::default()
        }));
        let mut engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(1)).await;
        assert_eq!(engine.send(b"x").await, SendOutcome::Dropped { attempts: 1 });
        assert_eq!(script.lock().unwrap().connect_calls, 1);
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let script = Arc::new(Mutex::new(Script::default()));
        let mut engine = engine(&script, 3);
        engine.close().await;
        assert_eq!(script.lock().unwrap().disconnects, 0);

        let mut engine = ForwardingEngine::start(MockConnector(script.clone()), &settings(3)).await;
        engine.close().await;
        assert!(!engine.is_connected());
        assert_eq!(script.lock().unwrap().disconnects, 1);
    }
}

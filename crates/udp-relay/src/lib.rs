// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP telemetry relay
//!
//! Receives JSON telemetry datagrams over UDP and forwards them, with the
//! reserved `type` key renamed to `read_type`, to a STOMP broker destination.
//!
//! # Features
//!
//! - **Adaptive buffer**: truncated datagrams double the receive buffer, up
//!   to 1024 times its initial size
//! - **Reliable send**: bounded retries, reconnecting between attempts
//! - **Liveness**: `ping` datagrams are answered with an HTTP `pong` to the
//!   monitor (see `udp-relay-monitor`)
//!
//! # Quick Start
//!
//! ```bash
//! udp-relay gen-config --output relay.json
//! udp-relay --config relay.json
//! ```
//!
//! # Configuration File
//!
//! ```json
//! {
//!   "port": 9331,
//!   "monitorPort": 9330,
//!   "bufSize": 1024,
//!   "stompURI": "broker.example.org:61613",
//!   "stompLogin": "relay",
//!   "stompPassword": "secret",
//!   "endpoint": "/topic/telemetry",
//!   "stompIterations": 3
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod forward;
pub mod listener;
pub mod logging;
pub mod notify;
pub mod stomp;
pub mod transform;

pub use buffer::{AdaptiveBuffer, BufferExhausted};
pub use config::{BrokerSettings, ConfigError, HeartbeatSettings, RelayConfig};
pub use forward::{BrokerConnection, Connector, ForwardingEngine, SendOutcome};
pub use listener::{Disposition, Listener, ListenerStats, ListenerStatsSnapshot, RelayError};
pub use notify::{HttpNotifier, Notifier, NotifyError};
pub use stomp::{StompConnection, StompConnector, StompError};

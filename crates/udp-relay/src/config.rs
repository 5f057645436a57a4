// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay configuration.
//!
//! Loaded once from the JSON configuration file shared by the relay and its
//! monitor, then passed by reference to every component.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Relay and monitor configuration.
///
/// Field names follow the camel-case keys of the configuration file. A zero
/// or empty value means "use the default", so files written for older
/// deployments keep working.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// UDP port the relay listens on.
    pub port: u16,

    /// Address to bind (empty: all interfaces).
    pub ip_addr: String,

    /// Port of the monitor's HTTP server.
    pub monitor_port: u16,

    /// Initial receive buffer size in bytes.
    pub buf_size: usize,

    /// STOMP broker address (`host:port`).
    #[serde(rename = "stompURI")]
    pub stomp_uri: String,

    /// STOMP login.
    pub stomp_login: String,

    /// STOMP passcode.
    pub stomp_password: String,

    /// Maximum send attempts per packet.
    pub stomp_iterations: u32,

    /// Client heart-beat send interval (seconds).
    pub send_timeout: u64,

    /// Broker heart-beat receive interval (seconds).
    pub recv_timeout: u64,

    /// Multiplier applied to the incoming heart-beat deadline.
    pub heart_beat_grace_period: f64,

    /// STOMP destination packets are sent to.
    pub endpoint: String,

    /// Content type of forwarded packets.
    pub content_type: String,

    /// Monitor ping interval (seconds).
    pub monitor_interval: u64,

    /// Log file (empty: stderr).
    pub log_file: String,

    /// Verbose output.
    pub verbose: bool,
}

const DEFAULT_PORT: u16 = 9331;
const DEFAULT_MONITOR_PORT: u16 = 9330;
const DEFAULT_BUF_SIZE: usize = 1024;
const DEFAULT_STOMP_ITERATIONS: u32 = 3;
const DEFAULT_SEND_TIMEOUT: u64 = 600;
const DEFAULT_GRACE_PERIOD: f64 = 1.0;
const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_MONITOR_INTERVAL: u64 = 10;

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ip_addr: String::new(),
            monitor_port: DEFAULT_MONITOR_PORT,
            buf_size: DEFAULT_BUF_SIZE,
            stomp_uri: String::new(),
            stomp_login: String::new(),
            stomp_password: String::new(),
            stomp_iterations: DEFAULT_STOMP_ITERATIONS,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            recv_timeout: 0,
            heart_beat_grace_period: DEFAULT_GRACE_PERIOD,
            endpoint: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            log_file: String::new(),
            verbose: false,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(content)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Replace zero values with defaults.
    fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.monitor_port == 0 {
            self.monitor_port = DEFAULT_MONITOR_PORT;
        }
        if self.buf_size == 0 {
            self.buf_size = DEFAULT_BUF_SIZE;
        }
        if self.stomp_iterations == 0 {
            self.stomp_iterations = DEFAULT_STOMP_ITERATIONS;
        }
        if self.content_type.is_empty() {
            self.content_type = DEFAULT_CONTENT_TYPE.to_string();
        }
        if self.heart_beat_grace_period == 0.0 {
            self.heart_beat_grace_period = DEFAULT_GRACE_PERIOD;
        }
        if self.send_timeout == 0 {
            self.send_timeout = DEFAULT_SEND_TIMEOUT;
        }
        if self.monitor_interval == 0 {
            self.monitor_interval = DEFAULT_MONITOR_INTERVAL;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buf_size == 0 {
            return Err(ConfigError::Invalid("bufSize cannot be 0".into()));
        }
        if self.buf_size.checked_mul(crate::buffer::GROWTH_CAP).is_none() {
            return Err(ConfigError::Invalid(format!(
                "bufSize {} is too large",
                self.buf_size
            )));
        }
        if self.stomp_iterations == 0 {
            return Err(ConfigError::Invalid("stompIterations cannot be 0".into()));
        }
        if !self.heart_beat_grace_period.is_finite() || self.heart_beat_grace_period <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "heartBeatGracePeriod must be positive, got {}",
                self.heart_beat_grace_period
            )));
        }
        if self.monitor_interval == 0 {
            return Err(ConfigError::Invalid("monitorInterval cannot be 0".into()));
        }
        self.bind_ip()?;
        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        if self.ip_addr.is_empty() {
            return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        self.ip_addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid ipAddr '{}'", self.ip_addr)))
    }

    /// Address the UDP listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        let ip = self
            .bind_ip()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }

    /// Address the monitor pings.
    ///
    /// Unspecified bind addresses are reached through loopback.
    pub fn ping_target(&self) -> SocketAddr {
        let addr = self.listen_addr();
        if addr.ip().is_unspecified() {
            let loopback = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            };
            SocketAddr::new(loopback, addr.port())
        } else {
            addr
        }
    }

    /// Address the monitor's HTTP server binds to.
    pub fn monitor_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.monitor_port)
    }

    /// URL the relay posts `pong` notifications to.
    pub fn monitor_url(&self) -> String {
        format!("http://localhost:{}/", self.monitor_port)
    }

    /// Monitor ping interval.
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval)
    }

    /// Log file path, if one is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        if self.log_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.log_file))
        }
    }

    /// Broker settings, if forwarding is fully configured.
    pub fn broker(&self) -> Option<BrokerSettings> {
        if self.stomp_uri.is_empty()
            || self.stomp_login.is_empty()
            || self.stomp_password.is_empty()
            || self.endpoint.is_empty()
        {
            return None;
        }
        Some(BrokerSettings {
            uri: self.stomp_uri.clone(),
            login: self.stomp_login.clone(),
            password: self.stomp_password.clone(),
            destination: self.endpoint.clone(),
            content_type: self.content_type.clone(),
            max_attempts: self.stomp_iterations,
            heartbeat: self.heartbeat(),
        })
    }

    /// Heart-beat parameters offered to the broker.
    pub fn heartbeat(&self) -> HeartbeatSettings {
        HeartbeatSettings {
            send: Duration::from_secs(self.send_timeout),
            recv: Duration::from_secs(self.recv_timeout),
            grace_multiplier: self.heart_beat_grace_period,
        }
    }

    /// Example configuration written by `udp-relay gen-config`.
    pub fn example() -> Self {
        Self {
            stomp_uri: "broker.example.org:61613".into(),
            stomp_login: "relay".into(),
            stomp_password: "secret".into(),
            endpoint: "/topic/telemetry".into(),
            ..Default::default()
        }
    }
}

/// Broker subset of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    /// Broker address (`host:port`).
    pub uri: String,
    pub login: String,
    pub password: String,
    /// STOMP destination.
    pub destination: String,
    pub content_type: String,
    /// Maximum send attempts per packet (at least 1).
    pub max_attempts: u32,
    pub heartbeat: HeartbeatSettings,
}

/// Heart-beat parameters offered when connecting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatSettings {
    /// How often the client offers to send heart-beats.
    pub send: Duration,
    /// How often the client wants to receive heart-beats.
    pub recv: Duration,
    /// Tolerance multiplier on the incoming deadline.
    pub grace_multiplier: f64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            send: Duration::from_secs(DEFAULT_SEND_TIMEOUT),
            recv: Duration::ZERO,
            grace_multiplier: DEFAULT_GRACE_PERIOD,
        }
    }
}

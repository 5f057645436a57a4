// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal STOMP 1.2 client used to deliver packets to the broker.
//!
//! Only the client side of `CONNECT`, `SEND` and `DISCONNECT` is
//! implemented, plus heart-beating in both directions.

use std::time::Duration;
use thiserror::Error;

pub mod connection;
pub mod frame;
pub mod heartbeat;

pub use connection::{StompConnection, StompConnector};
pub use frame::{Decoded, Frame, FrameDecoder};
pub use heartbeat::Heartbeat;

/// Bound on TCP connect plus the `CONNECTED` handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest frame accepted from the broker.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame-level protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("invalid header escape sequence {0}")]
    InvalidEscape(String),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("invalid heart-beat header '{0}'")]
    InvalidHeartbeat(String),

    #[error("unexpected {0} frame")]
    UnexpectedFrame(String),
}

/// Broker connection errors.
#[derive(Debug, Error)]
pub enum StompError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("timed out connecting to {0}")]
    Timeout(String),

    #[error("broker rejected connection: {0}")]
    Rejected(String),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("no broker connection")]
    NotConnected,
}

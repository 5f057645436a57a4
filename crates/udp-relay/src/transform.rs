// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram classification and packet transformation.
//!
//! A datagram is either the `ping` control message or a JSON object. Parsed
//! objects get the reserved `type` key renamed to `read_type` before they
//! are re-encoded for the broker.

use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

/// Control payload sent by the monitor.
pub const PING: &[u8] = b"ping";

/// Control payload returned to the monitor.
pub const PONG: &[u8] = b"pong";

/// Key renamed by [`rename_type`].
pub const TYPE_KEY: &str = "type";

/// Key holding the former `type` value.
pub const READ_TYPE_KEY: &str = "read_type";

/// Maximum characters of a payload written to the log.
pub const MAX_LOGGED_PAYLOAD: usize = 1000;

/// A parsed JSON object with arbitrary values.
pub type DataPacket = Map<String, Value>;

/// Outcome of classifying one datagram payload.
#[derive(Debug)]
pub enum Classified {
    /// Monitor ping.
    Ping,
    /// Well-formed JSON object.
    Packet(DataPacket),
    /// JSON ended early: the datagram did not fit the receive buffer.
    Truncated,
    /// Anything else that is not a JSON object.
    Malformed(serde_json::Error),
}

/// Classify a datagram payload.
pub fn classify(payload: &[u8]) -> Classified {
    if payload == PING {
        return Classified::Ping;
    }
    match serde_json::from_slice::<DataPacket>(payload) {
        Ok(packet) => Classified::Packet(packet),
        // A truncated read always fills the buffer, so an empty payload is
        // never a truncation.
        Err(err) if err.is_eof() && !payload.is_empty() => Classified::Truncated,
        Err(err) => Classified::Malformed(err),
    }
}

/// Move `type` to `read_type`. No-op when `type` is absent.
pub fn rename_type(packet: &mut DataPacket) {
    if let Some(value) = packet.remove(TYPE_KEY) {
        packet.insert(READ_TYPE_KEY.to_string(), value);
    }
}

/// Transformation errors.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unable to encode packet: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
        /// Truncated dump of the packet for the log.
        dump: String,
    },
}

/// Rename `type` and re-encode the packet.
pub fn transform(mut packet: DataPacket) -> Result<Vec<u8>, TransformError> {
    rename_type(&mut packet);
    serde_json::to_vec(&packet).map_err(|source| TransformError::Encode {
        source,
        dump: truncate_for_log(&format!("{:?}", packet), MAX_LOGGED_PAYLOAD).into_owned(),
    })
}

/// Truncate `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_for_log(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &text[..idx])),
        None => Cow::Borrowed(text),
    }
}

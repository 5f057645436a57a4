// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heart-beat negotiation.

use super::ProtocolError;
use crate::config::HeartbeatSettings;
use std::time::Duration;

/// Negotiated heart-beat intervals. A zero interval means disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heartbeat {
    /// How often the client sends a heart-beat.
    pub outgoing: Duration,
    /// How often the broker promised to send one.
    pub incoming: Duration,
    /// Silence tolerated from the broker before the connection is dead.
    pub incoming_deadline: Option<Duration>,
}

impl Heartbeat {
    /// `heart-beat` header value offered in `CONNECT`.
    pub fn offer(settings: &HeartbeatSettings) -> String {
        format!(
            "{},{}",
            settings.send.as_millis(),
            settings.recv.as_millis()
        )
    }

    /// Combine the client offer with the broker's `heart-beat` header.
    ///
    /// Each direction uses the larger of the two intervals, or is disabled
    /// when either side sent 0.
    pub fn negotiate(
        settings: &HeartbeatSettings,
        server: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let (sx, sy) = match server {
            Some(value) => parse_header(value)?,
            None => (0, 0),
        };
        let cx = settings.send.as_millis() as u64;
        let cy = settings.recv.as_millis() as u64;

        let outgoing = combine(cx, sy);
        let incoming = combine(cy, sx);
        let incoming_deadline = if incoming.is_zero() {
            None
        } else {
            Some(incoming.mul_f64(settings.grace_multiplier))
        };

        Ok(Self {
            outgoing,
            incoming,
            incoming_deadline,
        })
    }
}

fn combine(ours: u64, theirs: u64) -> Duration {
    if ours == 0 || theirs == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(ours.max(theirs))
    }
}

fn parse_header(value: &str) -> Result<(u64, u64), ProtocolError> {
    let invalid = || ProtocolError::InvalidHeartbeat(value.to_string());
    let (x, y) = value.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse().map_err(|_| invalid())?;
    let y = y.trim().parse().map_err(|_| invalid())?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(send_ms: u64, recv_ms: u64, grace: f64) -> HeartbeatSettings {
        HeartbeatSettings {
            send: Duration::from_millis(send_ms),
            recv: Duration::from_millis(recv_ms),
            grace_multiplier: grace,
        }
    }

    #[test]
    fn test_offer() {
        assert_eq!(Heartbeat::offer(&settings(600_000, 0, 1.0)), "600000,0");
    }

    #[test]
    fn test_negotiate_takes_maximum() {
        let hb = Heartbeat::negotiate(&settings(1000, 2000, 1.0), Some("3000,500")).unwrap();
        assert_eq!(hb.outgoing, Duration::from_millis(1000));
        assert_eq!(hb.incoming, Duration::from_millis(3000));
        assert_eq!(hb.incoming_deadline, Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_negotiate_zero_disables() {
        let hb = Heartbeat::negotiate(&settings(1000, 0, 1.0), Some("0,0")).unwrap();
        assert!(hb.outgoing.is_zero());
        assert!(hb.incoming.is_zero());
        assert_eq!(hb.incoming_deadline, None);

        let hb = Heartbeat::negotiate(&settings(1000, 1000, 1.0), None).unwrap();
        assert!(hb.outgoing.is_zero());
        assert!(hb.incoming.is_zero());
    }

    #[test]
    fn test_grace_multiplier_applies_to_incoming_deadline() {
        let hb = Heartbeat::negotiate(&settings(0, 4000, 1.5), Some("2000,0")).unwrap();
        assert!(hb.outgoing.is_zero());
        assert_eq!(hb.incoming, Duration::from_millis(4000));
        assert_eq!(hb.incoming_deadline, Some(Duration::from_millis(6000)));
    }

    #[test]
    fn test_invalid_header() {
        assert!(Heartbeat::negotiate(&settings(1, 1, 1.0), Some("abc")).is_err());
        assert!(Heartbeat::negotiate(&settings(1, 1, 1.0), Some("1,x")).is_err());
    }
}

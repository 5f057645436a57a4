// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Adaptive receive buffer.
//!
//! UDP truncates datagrams that do not fit the receive buffer and the lost
//! tail cannot be read again. The listener therefore drops a truncated
//! datagram and doubles the buffer for later reads, up to a fixed multiple
//! of the configured size.

use thiserror::Error;

/// Maximum growth factor over the initial buffer size.
pub const GROWTH_CAP: usize = 1024;

/// The buffer would have to grow past its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("receive buffer of {requested} bytes exceeds the limit of {limit} bytes")]
pub struct BufferExhausted {
    /// Size the doubling would have produced.
    pub requested: usize,
    /// `initial * GROWTH_CAP`.
    pub limit: usize,
}

/// Receive buffer whose size doubles on each truncation.
#[derive(Debug)]
pub struct AdaptiveBuffer {
    initial: usize,
    data: Vec<u8>,
}

impl AdaptiveBuffer {
    /// Create a buffer of `initial` bytes.
    pub fn new(initial: usize) -> Self {
        Self {
            initial,
            data: vec![0u8; initial],
        }
    }

    /// Current size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Size the buffer started with.
    pub fn initial_size(&self) -> usize {
        self.initial
    }

    /// Largest size the buffer may reach.
    pub fn limit(&self) -> usize {
        self.initial.saturating_mul(GROWTH_CAP)
    }

    /// Slice to receive into.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// First `len` received bytes.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }

    /// Double the buffer for future reads.
    ///
    /// Fails, leaving the size unchanged, once the doubled size would exceed
    /// [`limit`](Self::limit).
    pub fn grow(&mut self) -> Result<usize, BufferExhausted> {
        let limit = self.limit();
        let requested = self.data.len().saturating_mul(2);
        if requested > limit {
            return Err(BufferExhausted { requested, limit });
        }
        self.data.resize(requested, 0);
        Ok(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_size() {
        let buffer = AdaptiveBuffer::new(512);
        assert_eq!(buffer.size(), 512);
        assert_eq!(buffer.initial_size(), 512);
        assert_eq!(buffer.limit(), 512 * 1024);
    }

    #[test]
    fn test_grow_doubles() {
        let mut buffer = AdaptiveBuffer::new(100);
        assert_eq!(buffer.grow(), Ok(200));
        assert_eq!(buffer.grow(), Ok(400));
        assert_eq!(buffer.size(), 400);
        assert_eq!(buffer.as_mut_slice().len(), 400);
    }

    #[test]
    fn test_grow_sequence_until_cap() {
        let initial = 8;
        let mut buffer = AdaptiveBuffer::new(initial);
        let mut expected = initial;

        // 8 -> 16 -> ... -> 8 * 1024 is ten doublings
        for _ in 0..10 {
            expected *= 2;
            assert_eq!(buffer.grow(), Ok(expected));
        }
        assert_eq!(buffer.size(), initial * GROWTH_CAP);

        let err = buffer.grow().unwrap_err();
        assert_eq!(err.requested, initial * 2048);
        assert_eq!(err.limit, initial * 1024);
        assert_eq!(buffer.size(), initial * GROWTH_CAP);
    }

    #[test]
    fn test_filled_is_clamped() {
        let mut buffer = AdaptiveBuffer::new(4);
        buffer.as_mut_slice().copy_from_slice(b"ping");
        assert_eq!(buffer.filled(4), b"ping");
        assert_eq!(buffer.filled(2), b"pi");
        assert_eq!(buffer.filled(10), b"ping");
    }
}

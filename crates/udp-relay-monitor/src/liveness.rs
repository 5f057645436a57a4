// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Last-contact timestamp and staleness evaluation.
//!
//! The HTTP responder is the only writer; health checks only read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Health checks fail once the last contact is this many monitor intervals
/// old.
pub const STALENESS_FACTOR: u32 = 3;

/// Shared last-contact cell.
///
/// Stored as milliseconds since a fixed origin so it fits one atomic.
#[derive(Debug)]
pub struct Liveness {
    origin: Instant,
    last_contact_ms: AtomicU64,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// Start with a contact recorded now, so a fresh monitor is healthy.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start with a contact recorded at `origin`.
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            last_contact_ms: AtomicU64::new(0),
        }
    }

    pub fn record_contact(&self) {
        self.record_contact_at(Instant::now());
    }

    pub fn record_contact_at(&self, at: Instant) {
        let ms = at.saturating_duration_since(self.origin).as_millis();
        self.last_contact_ms
            .store(u64::try_from(ms).unwrap_or(u64::MAX), Ordering::Release);
    }

    pub fn last_contact(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_contact_ms.load(Ordering::Acquire))
    }

    /// Time elapsed between the last contact and `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_contact())
    }

    pub fn evaluate(&self, interval: Duration) -> Health {
        self.evaluate_at(Instant::now(), interval)
    }

    /// Healthy while the contact is younger than
    /// `STALENESS_FACTOR * interval`.
    pub fn evaluate_at(&self, now: Instant, interval: Duration) -> Health {
        let age = self.age_at(now);
        let threshold = interval.saturating_mul(STALENESS_FACTOR);
        if age < threshold {
            Health::Healthy { age }
        } else {
            Health::Stale { age, threshold }
        }
    }
}

/// Result of a health evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy { age: Duration },
    Stale { age: Duration, threshold: Duration },
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

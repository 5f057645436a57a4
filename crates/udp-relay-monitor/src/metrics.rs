// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monitor counters and their Prometheus text export.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monitor counters.
#[derive(Debug)]
pub struct MonitorStats {
    /// `ping` datagrams sent.
    pub pings_sent: AtomicU64,
    /// `ping` datagrams that could not be sent.
    pub ping_failures: AtomicU64,
    /// `pong` notifications received.
    pub contacts: AtomicU64,
    /// Health checks answered with an error.
    pub health_failures: AtomicU64,
    pub created: Instant,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStats {
    pub fn new() -> Self {
        Self {
            pings_sent: AtomicU64::new(0),
            ping_failures: AtomicU64::new(0),
            contacts: AtomicU64::new(0),
            health_failures: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self, since_contact: Duration) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            ping_failures: self.ping_failures.load(Ordering::Relaxed),
            contacts: self.contacts.load(Ordering::Relaxed),
            health_failures: self.health_failures.load(Ordering::Relaxed),
            since_contact_secs: since_contact.as_secs_f64(),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorStatsSnapshot {
    pub pings_sent: u64,
    pub ping_failures: u64,
    pub contacts: u64,
    pub health_failures: u64,
    pub since_contact_secs: f64,
    pub uptime_secs: u64,
}

#[derive(Clone, Copy, Debug)]
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

struct MetricDef {
    name: &'static str,
    help: &'static str,
    metric_type: MetricType,
}

const MONITOR_METRICS: &[MetricDef] = &[
    MetricDef {
        name: "pings_sent_total",
        help: "Total number of ping datagrams sent to the relay",
        metric_type: MetricType::Counter,
    },
    MetricDef {
        name: "ping_failures_total",
        help: "Total number of ping datagrams that could not be sent",
        metric_type: MetricType::Counter,
    },
    MetricDef {
        name: "contacts_total",
        help: "Total number of pong notifications received from the relay",
        metric_type: MetricType::Counter,
    },
    MetricDef {
        name: "health_checks_failed_total",
        help: "Total number of health checks answered with an error",
        metric_type: MetricType::Counter,
    },
    MetricDef {
        name: "last_contact_age_seconds",
        help: "Seconds since the last pong notification",
        metric_type: MetricType::Gauge,
    },
    MetricDef {
        name: "uptime_seconds",
        help: "Time since the monitor started in seconds",
        metric_type: MetricType::Gauge,
    },
];

/// Export monitor metrics in Prometheus text format, each name prefixed with
/// `{prefix}_monitor_`.
pub fn export_metrics(snapshot: &MonitorStatsSnapshot, prefix: &str) -> String {
    let mut output = String::with_capacity(1024);

    for def in MONITOR_METRICS {
        let full_name = format!("{}_monitor_{}", prefix, def.name);
        let _ = writeln!(output, "# TYPE {} {}", full_name, def.metric_type.as_str());
        let _ = writeln!(output, "# HELP {} {}", full_name, def.help);
        let _ = writeln!(output, "{} {}", full_name, metric_value(snapshot, def.name));
        let _ = writeln!(output);
    }

    output
}

fn metric_value(snapshot: &MonitorStatsSnapshot, name: &str) -> String {
    match name {
        "pings_sent_total" => snapshot.pings_sent.to_string(),
        "ping_failures_total" => snapshot.ping_failures.to_string(),
        "contacts_total" => snapshot.contacts.to_string(),
        "health_checks_failed_total" => snapshot.health_failures.to_string(),
        "last_contact_age_seconds" => format!("{:.3}", snapshot.since_contact_secs),
        "uptime_seconds" => snapshot.uptime_secs.to_string(),
        _ => "0".to_string(),
    }
}

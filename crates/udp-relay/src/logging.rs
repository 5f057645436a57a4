// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log subscriber setup shared by the relay and the monitor.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Level used when nothing else selects one.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Build the filter: `RUST_LOG` first, then `level_override`, then the
/// config verbosity.
pub fn filter(verbose: bool, level_override: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = level_override.unwrap_or(default_level(verbose));
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(default_level(verbose)))
}

/// Install the global subscriber, writing to `log_file` when given.
pub fn init(verbose: bool, level_override: Option<&str>, log_file: Option<&Path>) -> io::Result<()> {
    let filter = filter(verbose, level_override);

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
    Ok(())
}

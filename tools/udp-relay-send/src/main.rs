// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! udp-relay-send - synthetic traffic for udp-relay
//!
//! Sends `ndocs` fake transfer records as JSON datagrams, or one `ping`.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

/// Send synthetic telemetry records to udp-relay
#[derive(Parser, Debug)]
#[command(name = "udp-relay-send")]
#[command(version)]
#[command(about = "Send synthetic telemetry records (or a ping) to udp-relay")]
struct Args {
    /// Relay host name
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Relay UDP port
    #[arg(short, long, default_value = "9331")]
    port: u16,

    /// Number of records to send
    #[arg(short = 'n', long, default_value = "10")]
    ndocs: usize,

    /// Send a single `ping` instead of records
    #[arg(long)]
    ping: bool,

    /// Pause between records (milliseconds)
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// User name embedded in `user_dn`
    #[arg(long, default_value = "test")]
    user: String,
}

/// One fake transfer record; `seed` makes `unique_id` and `file_lfn` unique.
fn record(seed: usize, user: &str, host: &str) -> Value {
    json!({
        "read_vector_bytes": 133206046,
        "site_name": "T3_US_Cornell",
        "read_vector_ndocs_average": 21.4118,
        "user_dn": format!("/DC=ch/DC=cern/OU=Organic Units/OU=Users/CN={}{}", user, seed),
        "file_lfn": format!("/store/fake/file_{}.root", seed),
        "read_bytes": 148607872,
        "file_size": 27502730289u64,
        "read_single_average": 3793.55,
        "client_host": "rossmann-a251",
        "read_vector_average": 7835650.0,
        "read_vector_sigma": 7081190.0,
        "server_host": "cmshdp-d019",
        "read_vector_operations": 17,
        "read_single_bytes": 15401826,
        "app_info": "something",
        "client_domain": host,
        "start_time": 1395960729,
        "read_vector_ndocs_sigma": 56.0631,
        "read_single_sigma": 84703.9,
        "server_domain": host,
        "read_single_operations": 4060,
        "read_bytes_at_close": 148607872,
        "end_time": 1395960959,
        "fallback": false,
        "unique_id": format!("60DC3A6D-02B6-E311-B2BD-0002C90B73D8-0{}", seed),
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind UDP socket")?;
    socket
        .connect((args.host.as_str(), args.port))
        .with_context(|| format!("failed to resolve {}:{}", args.host, args.port))?;

    if args.ping {
        socket.send(b"ping").context("failed to send ping")?;
        println!("ping sent to {}:{}", args.host, args.port);
        return Ok(());
    }

    let mut sent = 0usize;
    for i in 0..args.ndocs {
        let payload = serde_json::to_vec(&record(i, &args.user, &args.host))?;
        match socket.send(&payload) {
            Ok(_) => sent += 1,
            Err(e) => eprintln!("record {}: {}", i, e),
        }
        if args.delay_ms > 0 {
            thread::sleep(Duration::from_millis(args.delay_ms));
        }
    }

    println!("{} of {} records sent to {}:{}", sent, args.ndocs, args.host, args.port);
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monitor HTTP surface.
//!
//! - `POST /`: `pong` notification from the relay
//! - `GET /health`: staleness check
//! - `GET /metrics`: Prometheus text
//!
//! Anything else is answered with 405.

use crate::liveness::{Health, Liveness};
use crate::metrics::{export_metrics, MonitorStats};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use udp_relay::transform::PONG;

/// Prefix of exported metric names.
pub const METRICS_PREFIX: &str = "udp_relay";

/// State shared by the handlers.
#[derive(Debug)]
pub struct AppState {
    pub liveness: Arc<Liveness>,
    pub stats: Arc<MonitorStats>,
    /// Monitor ping interval.
    pub interval: Duration,
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(record_contact))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /
async fn record_contact(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    if body.as_ref() == PONG {
        state.liveness.record_contact();
        state.stats.contacts.fetch_add(1, Ordering::Relaxed);
        debug!("pong received");
    } else {
        debug!("ignoring notification body of {} bytes", body.len());
    }
    StatusCode::OK
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.liveness.evaluate(state.interval) {
        Health::Healthy { .. } => (StatusCode::OK, "OK").into_response(),
        Health::Stale { age, threshold } => {
            state.stats.health_failures.fetch_add(1, Ordering::Relaxed);
            warn!("health check failed: last contact {:?} ago", age);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Error: last update is too old ({}s ago, limit {}s)",
                    age.as_secs(),
                    threshold.as_secs()
                ),
            )
                .into_response()
        }
    }
}

/// GET /metrics
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let age = state.liveness.age_at(std::time::Instant::now());
    let body = export_metrics(&state.stats.snapshot(age), METRICS_PREFIX);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

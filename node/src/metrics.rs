//! # Prometheus Metrics
//!
//! Exposes operational metrics for the onboarding node. Scraped by
//! Prometheus at the `/metrics` HTTP endpoint on the configured metrics
//! port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of accepted ork registration/update operations.
    pub orks_registered_total: IntCounter,
    /// Total number of accepted user initializations (including refreshes).
    pub users_initialized_total: IntCounter,
    /// Total number of accepted user confirmations.
    pub users_confirmed_total: IntCounter,
    /// Total number of accepted fragment posts (creates and overwrites).
    pub fragments_posted_total: IntCounter,
    /// Total number of operations rejected by a precondition.
    pub operations_rejected_total: IntCounter,
    /// Current number of users awaiting confirmation.
    pub pending_users: IntGauge,
    /// Histogram of operation handling latency in seconds.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("tessera".into()), None)
            .expect("failed to create prometheus registry");

        let orks_registered_total = IntCounter::new(
            "orks_registered_total",
            "Total number of accepted ork registration operations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(orks_registered_total.clone()))
            .expect("metric registration");

        let users_initialized_total = IntCounter::new(
            "users_initialized_total",
            "Total number of accepted user initializations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(users_initialized_total.clone()))
            .expect("metric registration");

        let users_confirmed_total = IntCounter::new(
            "users_confirmed_total",
            "Total number of accepted user confirmations",
        )
        .expect("metric creation");
        registry
            .register(Box::new(users_confirmed_total.clone()))
            .expect("metric registration");

        let fragments_posted_total = IntCounter::new(
            "fragments_posted_total",
            "Total number of accepted fragment posts",
        )
        .expect("metric creation");
        registry
            .register(Box::new(fragments_posted_total.clone()))
            .expect("metric registration");

        let operations_rejected_total = IntCounter::new(
            "operations_rejected_total",
            "Total number of operations rejected by a precondition",
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_rejected_total.clone()))
            .expect("metric registration");

        let pending_users = IntGauge::new(
            "pending_users",
            "Current number of users awaiting confirmation",
        )
        .expect("metric creation");
        registry
            .register(Box::new(pending_users.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "End-to-end operation handling latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            orks_registered_total,
            users_initialized_total,
            users_confirmed_total,
            fragments_posted_total,
            operations_rejected_total,
            pending_users,
            operation_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

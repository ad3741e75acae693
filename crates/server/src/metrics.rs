//! Prometheus metrics for the depot server.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Restrict it at the network level when enabled.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PACKAGES_ADDED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("depot_packages_added_total", "Total packages accepted"),
        &["repo"],
    )
    .expect("metric creation failed")
});

pub static PACKAGES_REMOVED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("depot_packages_removed_total", "Total packages removed"),
        &["repo"],
    )
    .expect("metric creation failed")
});

pub static MUTATION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "depot_mutation_errors_total",
            "Total failed repository mutations by error kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static INDEX_SIGNING_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_index_signing_failures_total",
        "Total repository index signing failures",
    )
    .expect("metric creation failed")
});

pub static INDEX_REGENERATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "depot_index_regeneration_duration_seconds",
            "Time taken to rebuild, sign and publish one repository index",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(PACKAGES_ADDED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGES_REMOVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MUTATION_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_SIGNING_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INDEX_REGENERATION_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a failed mutation by kind.
pub fn record_mutation_error(kind: &str) {
    MUTATION_ERRORS.with_label_values(&[kind]).inc();
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the tunnel manager.
//!
//! All metrics carry the `tunnel_manager_` prefix and are exposed on the
//! `/metrics` endpoint of the metrics server.
//!
//! # Metrics Categories
//!
//! - **Stage Metrics** - Outcome and duration of each sync stage (derive, tunnel, dns)
//! - **DNS Metrics** - CNAME mutations by action and records left untouched by reason
//! - **Cloudflare Metrics** - API requests by operation and outcome
//! - **State Metrics** - Size of the desired state
//!
//! # Example
//!
//! ```rust,no_run
//! use tunnel_manager::metrics::record_stage_success;
//!
//! record_stage_success("tunnel", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "tunnel_manager";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Stage Metrics
// ============================================================================

/// Total number of stage runs by stage and status
///
/// Labels:
/// - `stage`: `derive`, `tunnel` or `dns`
/// - `status`: `success` or `error`
pub static STAGE_RUNS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_stage_runs_total"),
        "Total number of sync stage runs by stage and status",
    );
    let counter = CounterVec::new(opts, &["stage", "status"])
        .expect("stage_runs_total definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("stage_runs_total registered once");
    counter
});

/// Duration of stage runs in seconds
pub static STAGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_stage_duration_seconds"),
        "Duration of sync stage runs in seconds by stage",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["stage"])
        .expect("stage_duration_seconds definition is valid");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("stage_duration_seconds registered once");
    histogram
});

// ============================================================================
// DNS Metrics
// ============================================================================

/// Total number of CNAME mutations
///
/// Labels:
/// - `action`: `create`, `update` or `delete`
/// - `status`: `success` or `error`
pub static DNS_MUTATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_mutations_total"),
        "Total number of DNS record mutations by action and status",
    );
    let counter = CounterVec::new(opts, &["action", "status"])
        .expect("dns_mutations_total definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("dns_mutations_total registered once");
    counter
});

/// Total number of hostnames or records left untouched
///
/// Labels:
/// - `reason`: `unmanaged_record`, `address_record`, `no_zone`
pub static DNS_SKIPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_skipped_total"),
        "Total number of hostnames or records skipped by the DNS reconciler, by reason",
    );
    let counter =
        CounterVec::new(opts, &["reason"]).expect("dns_skipped_total definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("dns_skipped_total registered once");
    counter
});

// ============================================================================
// Cloudflare Metrics
// ============================================================================

/// Total number of Cloudflare API requests, retries included
///
/// Labels:
/// - `operation`: e.g. `list_zones`, `create_record`
/// - `status`: `success` or `error`
pub static CLOUDFLARE_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cloudflare_requests_total"),
        "Total number of Cloudflare API requests by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"])
        .expect("cloudflare_requests_total definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("cloudflare_requests_total registered once");
    counter
});

// ============================================================================
// State Metrics
// ============================================================================

/// Number of hostnames in the most recently derived state
pub static DESIRED_HOSTNAMES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_desired_hostnames"),
        "Number of hostnames in the most recently derived desired state",
    )
    .expect("desired_hostnames definition is valid");
    METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("desired_hostnames registered once");
    gauge
});

// ============================================================================
// Recording helpers
// ============================================================================

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record a successful stage run
///
/// # Arguments
/// * `stage` - Stage name (`derive`, `tunnel`, `dns`)
/// * `duration` - Duration of the stage
pub fn record_stage_success(stage: &str, duration: Duration) {
    STAGE_RUNS_TOTAL
        .with_label_values(&[stage, "success"])
        .inc();
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

/// Record a failed stage run
///
/// # Arguments
/// * `stage` - Stage name (`derive`, `tunnel`, `dns`)
/// * `duration` - Duration of the stage before failure
pub fn record_stage_error(stage: &str, duration: Duration) {
    STAGE_RUNS_TOTAL.with_label_values(&[stage, "error"]).inc();
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

/// Record a CNAME create, update or delete
pub fn record_dns_mutation(action: &str, success: bool) {
    DNS_MUTATIONS_TOTAL
        .with_label_values(&[action, status_label(success)])
        .inc();
}

/// Record a hostname or record the DNS reconciler left untouched
pub fn record_dns_skipped(reason: &str) {
    DNS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record one Cloudflare API request attempt
pub fn record_cloudflare_request(operation: &str, success: bool) {
    CLOUDFLARE_REQUESTS_TOTAL
        .with_label_values(&[operation, status_label(success)])
        .inc();
}

/// Set the size of the desired state
#[allow(clippy::cast_precision_loss)]
pub fn set_desired_hostnames(count: usize) {
    DESIRED_HOSTNAMES.set(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;

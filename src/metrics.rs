//! Metrics recording and the optional Prometheus exporter.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};

pub const QUERIES_TOTAL: &str = "dns_queries_total";
pub const QUERIES_BLOCKED_TOTAL: &str = "dns_queries_blocked_total";
pub const QUERIES_FORWARDED_TOTAL: &str = "dns_queries_forwarded_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "dns_upstream_failures_total";
pub const STORE_FLUSH_FAILURES_TOTAL: &str = "store_flush_failures_total";

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape. When disabled, every
/// recording below is a no-op.
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|err| Error::Metrics(err.to_string()))?;

    Ok(())
}

pub fn record_query() {
    ::metrics::counter!(QUERIES_TOTAL).increment(1);
}

pub fn record_blocked() {
    ::metrics::counter!(QUERIES_BLOCKED_TOTAL).increment(1);
}

pub fn record_forwarded() {
    ::metrics::counter!(QUERIES_FORWARDED_TOTAL).increment(1);
}

pub fn record_upstream_failure(reason: &'static str) {
    ::metrics::counter!(UPSTREAM_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_flush_failure(store: &'static str) {
    ::metrics::counter!(STORE_FLUSH_FAILURES_TOTAL, "store" => store).increment(1);
}

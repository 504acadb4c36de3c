//! # Metrics
//!
//! Counters and gauges recorded through the `metrics` facade, rendered in Prometheus text
//! format by [`MetricsCollector`].
//!
//! | metric | labels |
//! |---|---|
//! | `keel_cache_hits_total` | `network`, `method` |
//! | `keel_cache_misses_total` | `network`, `method` |
//! | `keel_upstream_errors_total` | `network`, `error_type` |
//! | `keel_sync_batches_total` | `network` |
//! | `keel_sync_batch_failures_total` | `network` |
//! | `keel_sync_passes_total` | `network` |
//! | `keel_chain_head` (gauge) | `network` |
//!
//! Recording functions are free functions so that components can record without holding a
//! collector; without an installed recorder they are no-ops.
//!
//! ## String Interning
//!
//! Network names come from configuration and are interned once, so label values never allocate
//! on the request path.

use crate::types::RpcMethod;
use dashmap::DashMap;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static NETWORK_NAME_POOL: OnceLock<DashMap<String, &'static str>> = OnceLock::new();

#[inline]
fn network_label(network: &str) -> &'static str {
    let pool = NETWORK_NAME_POOL.get_or_init(DashMap::new);
    if let Some(name) = pool.get(network) {
        return *name;
    }
    *pool
        .entry(network.to_string())
        .or_insert_with(|| Box::leak(network.to_string().into_boxed_str()))
}

pub fn record_cache_hit(network: &str, method: RpcMethod) {
    counter!("keel_cache_hits_total", "network" => network_label(network), "method" => method.as_str())
        .increment(1);
}

pub fn record_cache_miss(network: &str, method: RpcMethod) {
    counter!("keel_cache_misses_total", "network" => network_label(network), "method" => method.as_str())
        .increment(1);
}

pub fn record_upstream_error(network: &str, error_type: &'static str) {
    counter!("keel_upstream_errors_total", "network" => network_label(network), "error_type" => error_type)
        .increment(1);
}

pub fn record_sync_batch(network: &str) {
    counter!("keel_sync_batches_total", "network" => network_label(network)).increment(1);
}

pub fn record_sync_batch_failure(network: &str) {
    counter!("keel_sync_batch_failures_total", "network" => network_label(network)).increment(1);
}

pub fn record_sync_pass(network: &str) {
    counter!("keel_sync_passes_total", "network" => network_label(network)).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_chain_head(network: &str, number: u64) {
    gauge!("keel_chain_head", "network" => network_label(network)).set(number as f64);
}

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to install global prometheus recorder, metrics will not be exported"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Owner of the process-wide Prometheus recorder.
#[derive(Clone)]
pub struct MetricsCollector {
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    /// Installs the global recorder on first use; later calls share it.
    #[must_use]
    pub fn new() -> Self {
        Self { prometheus_handle: init_prometheus_recorder() }
    }

    /// Current metrics in Prometheus text format.
    #[must_use]
    pub fn get_prometheus_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_labels_are_interned() {
        let first = network_label("mainnet");
        let second = network_label(&String::from("mainnet"));
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_recorded_metrics_are_rendered() {
        let collector = MetricsCollector::new();

        record_cache_hit("metrics-test", RpcMethod::GetLogs);
        record_sync_pass("metrics-test");
        record_chain_head("metrics-test", 2500);

        let rendered = collector.get_prometheus_metrics();
        assert!(rendered.contains("keel_cache_hits_total"));
        assert!(rendered.contains("keel_sync_passes_total"));
        assert!(rendered.contains("keel_chain_head"));
    }
}

//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Registry instances created through the factory.
    pub instances_created_total: IntCounter,
    /// Credentials minted across all instances.
    pub credentials_issued_total: IntCounter,
    /// Credentials burned across all instances.
    pub credentials_revoked_total: IntCounter,
    /// Calls refused, labelled by error kind.
    pub rejected_calls_total: IntCounterVec,
    /// Instances currently hosted by this node.
    pub live_instances: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("humanpass".into()), None)?;

        let instances_created_total = IntCounter::new(
            "instances_created_total",
            "Total number of registry instances created by the factory",
        )?;
        let credentials_issued_total = IntCounter::new(
            "credentials_issued_total",
            "Total number of credentials minted",
        )?;
        let credentials_revoked_total = IntCounter::new(
            "credentials_revoked_total",
            "Total number of credentials burned",
        )?;
        let rejected_calls_total = IntCounterVec::new(
            Opts::new("rejected_calls_total", "Total number of refused calls"),
            &["kind"],
        )?;
        let live_instances =
            IntGauge::new("live_instances", "Number of registry instances hosted")?;

        register(&registry, &instances_created_total)?;
        register(&registry, &credentials_issued_total)?;
        register(&registry, &credentials_revoked_total)?;
        register(&registry, &rejected_calls_total)?;
        register(&registry, &live_instances)?;

        Ok(Self {
            registry,
            instances_created_total,
            credentials_issued_total,
            credentials_revoked_total,
            rejected_calls_total,
            live_instances,
        })
    }

    /// Count one refused call of the given kind.
    pub fn reject(&self, kind: &str) {
        self.rejected_calls_total.with_label_values(&[kind]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register<C>(registry: &Registry, collector: &C) -> Result<(), prometheus::Error>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_contains_prefixed_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.instances_created_total.inc();
        metrics.reject("NonTransferable");

        let text = metrics.encode().unwrap();
        assert!(text.contains("humanpass_instances_created_total 1"));
        assert!(text.contains("humanpass_rejected_calls_total{kind=\"NonTransferable\"} 1"));
    }
}

//! Prometheus metrics for the hub.
//!
//! Tracks, per deployment version and client ID:
//! - currently connected clients (gauge)
//! - connection duration (histogram)
//! - delivered events (counter)

use crate::config::MetricsConfig;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Labels attached to every hub metric.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClientLabels {
    /// Deployment version.
    pub version: String,
    /// Client identifier.
    pub client: String,
}

/// Hub metrics and the registry they are registered in.
#[derive(Clone)]
pub struct HubMetrics {
    registry: Arc<Registry>,
    version: String,
    clients_count: Family<ClientLabels, Gauge>,
    connection_duration_seconds: Family<ClientLabels, Histogram>,
    events_count: Family<ClientLabels, Counter>,
}

impl fmt::Debug for HubMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubMetrics")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl HubMetrics {
    /// Build the metrics in a fresh registry, or `None` if metrics are disabled.
    pub fn from_config(config: &MetricsConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config))
    }

    /// Build the metrics and register them under the configured namespace.
    pub fn new(config: &MetricsConfig) -> Self {
        let mut registry = Registry::with_prefix(config.namespace());

        let clients_count = Family::<ClientLabels, Gauge>::default();
        registry.register(
            "http_sse_clients_count",
            "HTTP SSE number of clients",
            clients_count.clone(),
        );

        let connection_duration_seconds =
            Family::<ClientLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.1, 2.0, 16))
            });
        registry.register(
            "http_sse_connection_duration_seconds",
            "HTTP SSE connection duration in seconds",
            connection_duration_seconds.clone(),
        );

        // The text encoder appends `_total` to counters.
        let events_count = Family::<ClientLabels, Counter>::default();
        registry.register(
            "http_sse_events_count",
            "HTTP SSE total number of events",
            events_count.clone(),
        );

        Self {
            registry: Arc::new(registry),
            version: config.version().to_string(),
            clients_count,
            connection_duration_seconds,
            events_count,
        }
    }

    fn labels(&self, client_id: &str) -> ClientLabels {
        ClientLabels {
            version: self.version.clone(),
            client: client_id.to_string(),
        }
    }

    /// Record a new subscription.
    pub fn record_subscribe(&self, client_id: &str) {
        self.clients_count.get_or_create(&self.labels(client_id)).inc();
    }

    /// Record a removed subscription and how long it lived.
    pub fn record_unsubscribe(&self, client_id: &str, connected_for: Duration) {
        let labels = self.labels(client_id);
        self.connection_duration_seconds
            .get_or_create(&labels)
            .observe(connected_for.as_secs_f64());
        self.clients_count.get_or_create(&labels).dec();
    }

    /// Record an event handed to a client.
    pub fn record_event(&self, client_id: &str) {
        self.events_count.get_or_create(&self.labels(client_id)).inc();
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> MetricsConfig {
        MetricsConfig {
            enabled: true,
            namespace: "test".to_string(),
            version: "1.2.3".to_string(),
        }
    }

    #[test]
    fn test_disabled_builds_nothing() {
        assert!(HubMetrics::from_config(&MetricsConfig::default()).is_none());
        assert!(HubMetrics::from_config(&enabled()).is_some());
    }

    #[test]
    fn test_subscribe_and_unsubscribe_encoding() {
        let metrics = HubMetrics::new(&enabled());
        metrics.record_subscribe("alice");
        metrics.record_event("alice");
        metrics.record_event("alice");

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains(r#"test_http_sse_clients_count{version="1.2.3",client="alice"} 1"#));
        assert!(encoded
            .contains(r#"test_http_sse_events_count_total{version="1.2.3",client="alice"} 2"#));

        metrics.record_unsubscribe("alice", Duration::from_millis(1500));
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains(r#"test_http_sse_clients_count{version="1.2.3",client="alice"} 0"#));
        assert!(encoded.contains(
            r#"test_http_sse_connection_duration_seconds_count{version="1.2.3",client="alice"} 1"#
        ));
    }
}

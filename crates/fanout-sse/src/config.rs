//! Hub configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default metrics namespace.
pub const DEFAULT_NAMESPACE: &str = "sse";

/// Version label used when none is configured.
pub const UNTRACKED_VERSION: &str = "(untracked)";

/// Configuration for the SSE hub and its connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SseConfig {
    /// Idle timeout per client in milliseconds. Zero disables it.
    pub client_idle_ms: u64,
    /// Keep-alive comment interval in milliseconds. Zero disables it.
    pub keep_alive_ms: u64,
    /// Event channel capacity per client.
    pub client_buffer: usize,
    /// Capacity of the hub command mailbox.
    pub mailbox_size: usize,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            client_idle_ms: 0,
            keep_alive_ms: 15_000,
            client_buffer: 1,
            mailbox_size: 1024,
            metrics: MetricsConfig::default(),
        }
    }
}

impl SseConfig {
    /// Idle timeout applied to new clients.
    pub fn client_idle(&self) -> Duration {
        Duration::from_millis(self.client_idle_ms)
    }

    /// Keep-alive interval, if enabled.
    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_ms > 0).then(|| Duration::from_millis(self.keep_alive_ms))
    }
}

/// Metrics settings. Metrics objects are only built when `enabled` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Build and register hub metrics.
    pub enabled: bool,
    /// Prefix for every metric name.
    pub namespace: String,
    /// Deployment version label.
    pub version: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: UNTRACKED_VERSION.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Namespace, falling back to the default when blank.
    pub fn namespace(&self) -> &str {
        if self.namespace.trim().is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// Version label, falling back to `(untracked)` when blank.
    pub fn version(&self) -> &str {
        if self.version.trim().is_empty() {
            UNTRACKED_VERSION
        } else {
            &self.version
        }
    }
}

//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the orchestration engine.
///
/// Injected by whoever composes the service; there is no ambient global
/// configuration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Advisory turn timeout in seconds. The engine never enforces this
    /// itself; a host-level reaper is expected to poll scheduler state and
    /// advance or end sessions.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Advisory auto-advance flag carried in scheduler state.
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    /// When false, `record_metric` is a no-op returning an empty id.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    /// Retention window for raw metric entries, in seconds.
    #[serde(default = "default_metrics_retention_secs")]
    pub metrics_retention_secs: u64,
    /// Message count above which a session earns activity bonus points.
    #[serde(default = "default_high_activity_threshold")]
    pub high_activity_threshold: u64,
}

fn default_turn_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_metrics_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_high_activity_threshold() -> u64 {
    50
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: default_turn_timeout_secs(),
            auto_advance: true,
            metrics_enabled: true,
            metrics_retention_secs: default_metrics_retention_secs(),
            high_activity_threshold: default_high_activity_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: CoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.turn_timeout_secs, 300);
        assert!(config.auto_advance);
        assert!(config.metrics_enabled);
        assert_eq!(config.high_activity_threshold, 50);
    }
}

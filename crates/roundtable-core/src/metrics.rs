//! Performance metrics collection and derived scores.
//!
//! Metrics are write-once point observations rolled into per-session and
//! per-participant running aggregates. Aggregates update incrementally in
//! O(1) per metric; they are never recomputed from history, and purging
//! old raw metrics leaves them untouched.

use crate::config::CoreConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    SessionDuration,
    TurnDuration,
    ResponseTime,
    MemoryOps,
    BreakoutEfficiency,
    ErrorRate,
    ContextSwitchLatency,
    MessageVolume,
}

/// A write-once point observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub id: String,
    pub kind: MetricKind,
    pub session_id: String,
    #[serde(default)]
    pub participant_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Running per-session aggregate, updated incrementally on each metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub metric_count: u64,
    pub total_turns: u64,
    pub error_count: u64,
    pub message_count: u64,
    pub memory_ops: u64,
    pub avg_response_time_secs: f64,
    pub response_samples: u64,
    pub last_updated: DateTime<Utc>,
}

impl SessionStats {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            metric_count: 0,
            total_turns: 0,
            error_count: 0,
            message_count: 0,
            memory_ops: 0,
            avg_response_time_secs: 0.0,
            response_samples: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Running per-participant aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub session_id: String,
    pub participant_id: String,
    pub turns_taken: u64,
    pub message_count: u64,
    pub avg_response_time_secs: f64,
    pub response_samples: u64,
    pub longest_turn_secs: f64,
    pub shortest_turn_secs: f64,
}

impl ParticipantStats {
    fn new(session_id: &str, participant_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            participant_id: participant_id.to_string(),
            turns_taken: 0,
            message_count: 0,
            avg_response_time_secs: 0.0,
            response_samples: 0,
            longest_turn_secs: 0.0,
            shortest_turn_secs: f64::INFINITY,
        }
    }
}

/// Records metrics and maintains the running aggregates and derived
/// scores.
pub struct MetricsEngine {
    enabled: bool,
    retention: Duration,
    high_activity_threshold: u64,
    metrics: Vec<PerformanceMetric>,
    session_stats: HashMap<String, SessionStats>,
    participant_stats: HashMap<(String, String), ParticipantStats>,
}

impl MetricsEngine {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            enabled: config.metrics_enabled,
            retention: Duration::seconds(config.metrics_retention_secs as i64),
            high_activity_threshold: config.high_activity_threshold,
            metrics: Vec::new(),
            session_stats: HashMap::new(),
            participant_stats: HashMap::new(),
        }
    }

    /// Records a metric and updates the affected aggregates.
    ///
    /// Returns the metric id, or an empty string when metrics are globally
    /// disabled (deliberate no-op, not an error).
    pub fn record_metric(
        &mut self,
        kind: MetricKind,
        session_id: &str,
        value: f64,
        unit: &str,
        participant_id: Option<&str>,
        context: Option<String>,
        tags: Vec<String>,
    ) -> String {
        if !self.enabled {
            return String::new();
        }

        let metric = PerformanceMetric {
            id: format!("metric-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            kind,
            session_id: session_id.to_string(),
            participant_id: participant_id.map(str::to_string),
            timestamp: Utc::now(),
            value,
            unit: unit.to_string(),
            context,
            tags,
        };
        let id = metric.id.clone();

        self.update_session_stats(&metric);
        if let Some(pid) = participant_id {
            self.update_participant_stats(&metric, pid);
        }
        self.metrics.push(metric);

        id
    }

    fn update_session_stats(&mut self, metric: &PerformanceMetric) {
        let stats = self
            .session_stats
            .entry(metric.session_id.clone())
            .or_insert_with(|| SessionStats::new(&metric.session_id));

        stats.metric_count += 1;
        stats.last_updated = metric.timestamp;

        match metric.kind {
            MetricKind::TurnDuration => stats.total_turns += 1,
            MetricKind::ResponseTime => {
                stats.response_samples += 1;
                stats.avg_response_time_secs = incremental_mean(
                    stats.avg_response_time_secs,
                    metric.value,
                    stats.response_samples,
                );
            }
            MetricKind::ErrorRate => stats.error_count += 1,
            MetricKind::MemoryOps => stats.memory_ops += 1,
            MetricKind::MessageVolume => stats.message_count += metric.value.max(0.0) as u64,
            MetricKind::SessionDuration
            | MetricKind::BreakoutEfficiency
            | MetricKind::ContextSwitchLatency => {}
        }
    }

    fn update_participant_stats(&mut self, metric: &PerformanceMetric, participant_id: &str) {
        let stats = self
            .participant_stats
            .entry((metric.session_id.clone(), participant_id.to_string()))
            .or_insert_with(|| ParticipantStats::new(&metric.session_id, participant_id));

        match metric.kind {
            MetricKind::TurnDuration => {
                stats.turns_taken += 1;
                stats.longest_turn_secs = stats.longest_turn_secs.max(metric.value);
                stats.shortest_turn_secs = stats.shortest_turn_secs.min(metric.value);
            }
            MetricKind::ResponseTime => {
                stats.response_samples += 1;
                stats.avg_response_time_secs = incremental_mean(
                    stats.avg_response_time_secs,
                    metric.value,
                    stats.response_samples,
                );
            }
            MetricKind::MessageVolume => stats.message_count += metric.value.max(0.0) as u64,
            MetricKind::SessionDuration
            | MetricKind::MemoryOps
            | MetricKind::BreakoutEfficiency
            | MetricKind::ErrorRate
            | MetricKind::ContextSwitchLatency => {}
        }
    }

    /// Derived session performance score in [0, 100].
    ///
    /// Starts at 100; loses up to 30 points proportional to the error
    /// rate per turn, up to 20 points for average response time past the
    /// 10-second threshold, and gains up to 10 bonus points for message
    /// volume above the high-activity threshold. A session with no
    /// recorded metrics scores the defined default of 100.
    pub fn performance_score(&self, session_id: &str) -> f64 {
        let Some(stats) = self.session_stats.get(session_id) else {
            return 100.0;
        };

        let mut score = 100.0;

        if stats.total_turns > 0 {
            let error_ratio = stats.error_count as f64 / stats.total_turns as f64;
            score -= (30.0 * error_ratio).min(30.0);
        }

        if stats.response_samples > 0 && stats.avg_response_time_secs > 10.0 {
            let over = stats.avg_response_time_secs - 10.0;
            score -= (20.0 * over / 10.0).min(20.0);
        }

        if stats.message_count > self.high_activity_threshold {
            let above = (stats.message_count - self.high_activity_threshold) as f64;
            score += (above * 0.5).min(10.0);
        }

        score.clamp(0.0, 100.0)
    }

    /// Derived participant contribution score in [0, 100].
    ///
    /// `min(100, turns*10 + messages*2)`, scaled by 1.1 for fast average
    /// responses (< 5s) or 0.9 for slow ones (> 15s), then clamped.
    pub fn contribution_score(&self, session_id: &str, participant_id: &str) -> f64 {
        let key = (session_id.to_string(), participant_id.to_string());
        let Some(stats) = self.participant_stats.get(&key) else {
            return 0.0;
        };

        let base = (stats.turns_taken * 10 + stats.message_count * 2).min(100) as f64;
        let scaled = if stats.response_samples == 0 {
            base
        } else if stats.avg_response_time_secs < 5.0 {
            base * 1.1
        } else if stats.avg_response_time_secs > 15.0 {
            base * 0.9
        } else {
            base
        };

        scaled.clamp(0.0, 100.0)
    }

    /// Derived participant engagement score in [0, 100].
    ///
    /// 30% consistency (100 minus the spread between longest and shortest
    /// turn, spread capped at 50) blended with 70% participation
    /// (`min(100, turns*5)`).
    pub fn engagement_score(&self, session_id: &str, participant_id: &str) -> f64 {
        let key = (session_id.to_string(), participant_id.to_string());
        let Some(stats) = self.participant_stats.get(&key) else {
            return 0.0;
        };

        let spread = if stats.turns_taken < 2 {
            0.0
        } else {
            (stats.longest_turn_secs - stats.shortest_turn_secs).max(0.0)
        };
        let consistency = 100.0 - spread.min(50.0);
        let participation = (stats.turns_taken as f64 * 5.0).min(100.0);

        (0.3 * consistency + 0.7 * participation).clamp(0.0, 100.0)
    }

    /// Purges raw metric entries older than the retention window.
    ///
    /// Aggregates are not recomputed retroactively. Returns the number of
    /// entries removed.
    pub fn cleanup_old_metrics(&mut self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = self.metrics.len();
        self.metrics.retain(|m| m.timestamp >= cutoff);
        before - self.metrics.len()
    }

    pub fn session_stats(&self, session_id: &str) -> Option<&SessionStats> {
        self.session_stats.get(session_id)
    }

    pub fn participant_stats(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Option<&ParticipantStats> {
        self.participant_stats
            .get(&(session_id.to_string(), participant_id.to_string()))
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
}

/// O(1) running mean update.
fn incremental_mean(current: f64, value: f64, new_count: u64) -> f64 {
    current + (value - current) / new_count as f64
}

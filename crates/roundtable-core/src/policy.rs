//! Category-keyed error recovery policy.
//!
//! Every orchestration failure is routed through [`ErrorPolicy::handle`],
//! which dispatches on [`ErrorCategory`], counts the failure, and meters
//! the recovery attempt. Strategies decide whether the system state is
//! consistent enough to continue; they never mutate sessions themselves.

use crate::error::{CoreError, ErrorCategory};
use crate::metrics::{MetricKind, MetricsEngine};
use std::collections::HashMap;
use std::time::Instant;

/// Decides whether the engine recovered from an error of one category.
pub type RecoveryStrategy = Box<dyn Fn(&CoreError) -> bool + Send + Sync>;

/// Per-category error counts, serializable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorSummary {
    pub total: u64,
    pub by_category: std::collections::BTreeMap<&'static str, u64>,
}

/// Routes errors to recovery strategies and tracks failure counts.
pub struct ErrorPolicy {
    strategies: HashMap<ErrorCategory, RecoveryStrategy>,
    error_counts: HashMap<ErrorCategory, u64>,
}

impl ErrorPolicy {
    /// Policy with a default strategy registered for every category.
    pub fn new() -> Self {
        let mut policy = Self {
            strategies: HashMap::new(),
            error_counts: HashMap::new(),
        };
        for category in ErrorCategory::ALL {
            policy.register_strategy(category, Box::new(move |err| default_recovery(category, err)));
        }
        policy
    }

    /// Replaces the strategy for a category. The last registration wins.
    pub fn register_strategy(&mut self, category: ErrorCategory, strategy: RecoveryStrategy) {
        self.strategies.insert(category, strategy);
    }

    /// Handles one error: counts it, runs the category strategy, and
    /// meters the attempt as an `ErrorRate` metric tagged with the
    /// category, the outcome, and the recovery wall-clock cost.
    ///
    /// Returns whether the strategy reported recovery.
    pub fn handle(&mut self, error: &CoreError, metrics: &mut MetricsEngine) -> bool {
        let category = error.category();
        *self.error_counts.entry(category).or_insert(0) += 1;

        let started = Instant::now();
        let recovered = match self.strategies.get(&category) {
            Some(strategy) => strategy(error),
            None => false,
        };
        let elapsed = started.elapsed().as_secs_f64();

        let session_id = error
            .context()
            .session_id
            .as_deref()
            .unwrap_or("unknown");
        metrics.record_metric(
            MetricKind::ErrorRate,
            session_id,
            1.0,
            "count",
            error.context().participant_id.as_deref(),
            error.context().operation.clone(),
            vec![
                category.as_str().to_string(),
                if recovered { "recovered" } else { "unrecovered" }.to_string(),
                format!("recovery_secs={elapsed:.6}"),
            ],
        );

        if recovered {
            tracing::warn!(
                category = category.as_str(),
                recovery_secs = elapsed,
                error = %error,
                "recovered from orchestration error"
            );
        } else {
            tracing::error!(
                category = category.as_str(),
                error = %error,
                "unrecovered orchestration error"
            );
        }

        recovered
    }

    /// Total and per-category error counts since construction.
    pub fn error_summary(&self) -> ErrorSummary {
        let by_category: std::collections::BTreeMap<&'static str, u64> = self
            .error_counts
            .iter()
            .map(|(category, count)| (category.as_str(), *count))
            .collect();
        ErrorSummary {
            total: by_category.values().sum(),
            by_category,
        }
    }

    pub fn error_count(&self, category: ErrorCategory) -> u64 {
        self.error_counts.get(&category).copied().unwrap_or(0)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Default per-category recovery.
///
/// Lookup failures and state-machine violations leave the engine in a
/// consistent state, so they are recoverable as far as the engine is
/// concerned; the caller just received a precise error. Memory and store
/// failures are recoverable because the in-memory session state is
/// authoritative and the next mediation retries the whole document.
fn default_recovery(category: ErrorCategory, _error: &CoreError) -> bool {
    match category {
        ErrorCategory::SessionManagement
        | ErrorCategory::ParticipantManagement
        | ErrorCategory::TurnTaking
        | ErrorCategory::BreakoutRoom
        | ErrorCategory::CommunalMemory
        | ErrorCategory::VaultIntegration => true,
        ErrorCategory::InvalidOperation => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::error::ErrorContext;

    #[test]
    fn handle_counts_and_meters_errors() {
        let mut policy = ErrorPolicy::new();
        let mut metrics = MetricsEngine::new(&CoreConfig::default());

        let err = CoreError::session_not_found(
            "room-1",
            ErrorContext::new("get_session").with_session("room-1"),
        );
        let recovered = policy.handle(&err, &mut metrics);

        assert!(recovered);
        assert_eq!(policy.error_count(ErrorCategory::SessionManagement), 1);
        assert_eq!(metrics.session_stats("room-1").unwrap().error_count, 1);
    }

    #[test]
    fn custom_strategy_overrides_the_default() {
        let mut policy = ErrorPolicy::new();
        let mut metrics = MetricsEngine::new(&CoreConfig::default());
        policy.register_strategy(ErrorCategory::TurnTaking, Box::new(|_| false));

        let err = CoreError::turn_taking(
            "turn-taking not started",
            ErrorContext::new("advance_turn").with_session("room-1"),
        );
        assert!(!policy.handle(&err, &mut metrics));
    }

    #[test]
    fn summary_aggregates_by_category() {
        let mut policy = ErrorPolicy::new();
        let mut metrics = MetricsEngine::new(&CoreConfig::default());

        for _ in 0..2 {
            let err = CoreError::invalid_operation(
                "add_participant",
                "session is ended",
                ErrorContext::new("add_participant"),
            );
            policy.handle(&err, &mut metrics);
        }
        let err = CoreError::breakout_room("not open", ErrorContext::new("end_breakout"));
        policy.handle(&err, &mut metrics);

        let summary = policy.error_summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_category["invalid_operation"], 2);
        assert_eq!(summary.by_category["breakout_room"], 1);
    }
}

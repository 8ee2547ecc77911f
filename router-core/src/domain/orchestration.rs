use std::time::Duration;

/// Execution mode for a routing rule's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    LegacyOnly,
    ModernOnly,
    Parallel,
}

/// Governs whether and how a rule's mode transitions automatically.
///
/// Transitions from `Parallel` proceed only toward `ModernOnly`;
/// rollbacks proceed from `ModernOnly` back to `Parallel`. `LegacyOnly`
/// is a manually-set terminal or starting state and is never touched by
/// [`crate::transition::TransitionEvaluator`].
#[derive(Debug, Clone)]
pub struct TransitionConfig {
    pub auto_enabled: bool,
    pub match_rate_threshold: f64,
    pub stability_period: Duration,
    pub min_requests_for_transition: usize,
    pub rollback_threshold: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            auto_enabled: false,
            match_rate_threshold: 0.95,
            stability_period: Duration::from_secs(24 * 60 * 60),
            min_requests_for_transition: 100,
            rollback_threshold: 0.90,
        }
    }
}

/// Governs how (and whether) paired responses are diffed.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub enabled: bool,
    /// Dotted JSON-pointer paths excluded from diffing.
    pub ignore_fields: Vec<String>,
    pub allowable_numeric_difference: f64,
    pub strict_mode: bool,
    pub save_history: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_fields: vec!["timestamp".to_string(), "requestId".to_string()],
            allowable_numeric_difference: 0.01,
            strict_mode: false,
            save_history: true,
        }
    }
}

/// Ties a [`crate::domain::RoutingRule`] to its current mode and
/// thresholds.
#[derive(Debug, Clone)]
pub struct OrchestrationRule {
    pub rule_id: String,
    pub mode: Mode,
    pub transition: TransitionConfig,
    pub comparison: ComparisonConfig,
    /// Wall-clock time of the last mode change, for the flap guard in
    /// `spec.md` §4.7.
    pub last_mode_change: Option<chrono::DateTime<chrono::Utc>>,
}

impl OrchestrationRule {
    pub fn new(rule_id: impl Into<String>, mode: Mode) -> Self {
        Self {
            rule_id: rule_id.into(),
            mode,
            transition: TransitionConfig::default(),
            comparison: ComparisonConfig::default(),
            last_mode_change: None,
        }
    }
}

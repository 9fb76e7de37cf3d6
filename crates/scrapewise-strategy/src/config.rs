use std::time::Duration;

use serde::{Deserialize, Serialize};

use scrapewise_core::StrategyKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Attempts at or above this confidence end the fallback chain
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Order used for strategies without history, and to break ties
    #[serde(default = "default_order")]
    pub default_order: Vec<StrategyKind>,

    /// Samples needed before history overrides the default order
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Strategies whose historical success rate falls below this are tried
    /// after every strategy without history
    #[serde(default = "default_demote_below")]
    pub demote_below: f64,

    #[serde(default = "default_true")]
    pub skip_inapplicable: bool,
}

fn default_acceptance_threshold() -> f32 {
    0.7
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_order() -> Vec<StrategyKind> {
    StrategyKind::DEFAULT_ORDER.to_vec()
}

fn default_min_samples() -> u64 {
    1
}

fn default_demote_below() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            default_order: default_order(),
            min_samples: default_min_samples(),
            demote_below: default_demote_below(),
            skip_inapplicable: true,
        }
    }
}

impl StrategyConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Position in the configured default order. Kinds missing from the
    /// list sort after it, in their built-in order.
    pub fn order_rank(&self, kind: StrategyKind) -> usize {
        self.default_order
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.default_order.len() + kind.default_rank())
    }
}

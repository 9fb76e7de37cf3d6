use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use scrapewise_core::{ContentSignature, StrategyKind};

use crate::config::StrategyConfig;
use crate::profile::ContentProfile;
use crate::strategies::StrategySet;
use crate::tracker::PerformanceTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSource {
    History,
    Default,
}

/// A strategy in execution order, with the confidence expected from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub kind: StrategyKind,
    pub predicted_confidence: f32,
    pub source: RankSource,
}

struct Candidate {
    kind: StrategyKind,
    predicted: f32,
    history: Option<(f64, f64)>,
}

/// Orders strategies for one page.
///
/// Strategies with enough history for the page's signature come first, by
/// success rate then mean latency. Strategies without history follow in the
/// configured default order. Strategies whose history shows they rarely
/// succeed go last.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    config: StrategyConfig,
}

impl StrategySelector {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn rank(
        &self,
        strategies: &StrategySet,
        profile: &ContentProfile,
        signature: &ContentSignature,
        tracker: &PerformanceTracker,
    ) -> Vec<RankedStrategy> {
        let mut proven = Vec::new();
        let mut unknown = Vec::new();
        let mut demoted = Vec::new();

        for kind in strategies.kinds() {
            let Some(strategy) = strategies.get(kind) else {
                continue;
            };
            if self.config.skip_inapplicable && !strategy.applicable(profile) {
                debug!(strategy = %kind, format = %profile.format, "Skipping inapplicable strategy");
                continue;
            }

            let history = tracker
                .lookup(signature, kind)
                .filter(|r| r.sample_count >= self.config.min_samples)
                .map(|r| (r.success_rate(), r.mean_latency_ms));
            let candidate = Candidate {
                kind,
                predicted: strategy.predict(profile),
                history,
            };
            match history {
                Some((rate, _)) if rate < self.config.demote_below => demoted.push(candidate),
                Some(_) => proven.push(candidate),
                None => unknown.push(candidate),
            }
        }

        proven.sort_by(|a, b| self.by_history(a, b));
        demoted.sort_by(|a, b| self.by_history(a, b));
        unknown.sort_by_key(|c| self.config.order_rank(c.kind));

        let ranked: Vec<RankedStrategy> = proven
            .into_iter()
            .chain(unknown)
            .chain(demoted)
            .map(|c| match c.history {
                Some((rate, _)) => RankedStrategy {
                    kind: c.kind,
                    predicted_confidence: rate as f32,
                    source: RankSource::History,
                },
                None => RankedStrategy {
                    kind: c.kind,
                    predicted_confidence: c.predicted,
                    source: RankSource::Default,
                },
            })
            .collect();

        debug!(
            signature = %signature,
            order = ?ranked.iter().map(|r| r.kind.as_str()).collect::<Vec<_>>(),
            "Strategies ranked"
        );
        ranked
    }

    fn by_history(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let (a_rate, a_latency) = a.history.unwrap_or_default();
        let (b_rate, b_latency) = b.history.unwrap_or_default();
        b_rate
            .total_cmp(&a_rate)
            .then(a_latency.total_cmp(&b_latency))
            .then(self.config.order_rank(a.kind).cmp(&self.config.order_rank(b.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scrapewise_core::{AttemptOutcome, StrategyAttempt};

    use crate::testing::ScriptedStrategy;

    fn set() -> StrategySet {
        StrategyKind::DEFAULT_ORDER
            .iter()
            .fold(StrategySet::new(), |set, kind| {
                set.with(Arc::new(ScriptedStrategy::new(*kind).with_predicted(0.4)))
            })
    }

    fn record(tracker: &PerformanceTracker, kind: StrategyKind, outcome: AttemptOutcome, latency: u64) {
        tracker.record(StrategyAttempt::new(
            kind,
            ContentSignature::new("html:1"),
            outcome,
            0.5,
            latency,
        ));
    }

    fn kinds(ranked: &[RankedStrategy]) -> Vec<StrategyKind> {
        ranked.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_default_order_without_history() {
        let tracker = PerformanceTracker::new();
        let profile = ContentProfile::analyze("<html><body>x</body></html>");
        let ranked = StrategySelector::default().rank(
            &set(),
            &profile,
            &ContentSignature::new("html:1"),
            &tracker,
        );
        assert_eq!(kinds(&ranked), StrategyKind::DEFAULT_ORDER.to_vec());
        assert!(ranked.iter().all(|r| r.source == RankSource::Default));
        assert_eq!(ranked[0].predicted_confidence, 0.4);
    }

    #[test]
    fn test_history_ranks_first() {
        let tracker = PerformanceTracker::new();
        record(&tracker, StrategyKind::PatternMatch, AttemptOutcome::Success, 50);
        record(&tracker, StrategyKind::PathQuery, AttemptOutcome::Success, 20);
        record(&tracker, StrategyKind::PathQuery, AttemptOutcome::Partial, 20);

        let profile = ContentProfile::analyze("<html><body>x</body></html>");
        let ranked = StrategySelector::default().rank(
            &set(),
            &profile,
            &ContentSignature::new("html:1"),
            &tracker,
        );
        assert_eq!(
            kinds(&ranked),
            vec![
                StrategyKind::PatternMatch,
                StrategyKind::PathQuery,
                StrategyKind::StructuralSelector,
                StrategyKind::ModelAssisted,
            ]
        );
        assert_eq!(ranked[0].source, RankSource::History);
        assert_eq!(ranked[1].predicted_confidence, 0.5);
    }

    #[test]
    fn test_latency_breaks_ties() {
        let tracker = PerformanceTracker::new();
        record(&tracker, StrategyKind::StructuralSelector, AttemptOutcome::Success, 90);
        record(&tracker, StrategyKind::PatternMatch, AttemptOutcome::Success, 10);

        let profile = ContentProfile::analyze("<html><body>x</body></html>");
        let ranked = StrategySelector::default().rank(
            &set(),
            &profile,
            &ContentSignature::new("html:1"),
            &tracker,
        );
        assert_eq!(ranked[0].kind, StrategyKind::PatternMatch);
        assert_eq!(ranked[1].kind, StrategyKind::StructuralSelector);
    }

    #[test]
    fn test_failing_history_demoted() {
        let tracker = PerformanceTracker::new();
        record(&tracker, StrategyKind::StructuralSelector, AttemptOutcome::Fail, 5);

        let profile = ContentProfile::analyze("<html><body>x</body></html>");
        let ranked = StrategySelector::default().rank(
            &set(),
            &profile,
            &ContentSignature::new("html:1"),
            &tracker,
        );
        assert_eq!(ranked.last().map(|r| r.kind), Some(StrategyKind::StructuralSelector));
        assert_eq!(ranked[0].kind, StrategyKind::PathQuery);
    }

    #[test]
    fn test_other_signature_history_ignored() {
        let tracker = PerformanceTracker::new();
        record(&tracker, StrategyKind::ModelAssisted, AttemptOutcome::Success, 5);

        let profile = ContentProfile::analyze("<html><body>x</body></html>");
        let ranked = StrategySelector::default().rank(
            &set(),
            &profile,
            &ContentSignature::new("html:other"),
            &tracker,
        );
        assert_eq!(kinds(&ranked), StrategyKind::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn test_inapplicable_skipped() {
        let strategies = set().with(Arc::new(
            ScriptedStrategy::new(StrategyKind::PathQuery).with_applicable(false),
        ));
        let profile = ContentProfile::analyze("plain text");
        let ranked = StrategySelector::default().rank(
            &strategies,
            &profile,
            &ContentSignature::new("text:1"),
            &PerformanceTracker::new(),
        );
        assert!(!kinds(&ranked).contains(&StrategyKind::PathQuery));
    }
}

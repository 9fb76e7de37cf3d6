use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use scrapewise_core::{
    ContentSignature, PerformanceRecord, PlanStore, Result, StrategyAttempt, StrategyKind,
};

/// Attempts and aggregates for one content signature
#[derive(Default)]
struct SignatureShard {
    log: Vec<StrategyAttempt>,
    records: HashMap<StrategyKind, PerformanceRecord>,
    baseline: HashMap<StrategyKind, PerformanceRecord>,
}

/// Append-only attempt log with incrementally maintained aggregates per
/// (content signature, strategy).
///
/// State is sharded by signature: the outer map lock is only held to find or
/// insert a shard, so attempts on unrelated page shapes never wait on each
/// other. Aggregates are updated as each attempt is recorded, never
/// recomputed by rescanning the log. [`PerformanceTracker::recompute`] exists
/// to verify that the two agree.
#[derive(Default)]
pub struct PerformanceTracker {
    shards: RwLock<HashMap<ContentSignature, Arc<Mutex<SignatureShard>>>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed aggregates from records persisted by an earlier run.
    pub fn with_records(records: impl IntoIterator<Item = PerformanceRecord>) -> Self {
        let tracker = Self::new();
        tracker.seed(records);
        tracker
    }

    fn shard(&self, signature: &ContentSignature) -> Arc<Mutex<SignatureShard>> {
        if let Some(shard) = self.shards.read().get(signature) {
            return Arc::clone(shard);
        }
        Arc::clone(self.shards.write().entry(signature.clone()).or_default())
    }

    fn existing(&self, signature: &ContentSignature) -> Option<Arc<Mutex<SignatureShard>>> {
        self.shards.read().get(signature).cloned()
    }

    fn all_shards(&self) -> Vec<Arc<Mutex<SignatureShard>>> {
        self.shards.read().values().cloned().collect()
    }

    fn seed(&self, records: impl IntoIterator<Item = PerformanceRecord>) -> usize {
        let mut count = 0;
        for record in records {
            let shard = self.shard(&record.signature);
            let mut shard = shard.lock();
            merge_into(&mut shard.baseline, &record);
            merge_into(&mut shard.records, &record);
            count += 1;
        }
        count
    }

    /// Append an attempt to the log and fold it into its aggregate.
    pub fn record(&self, attempt: StrategyAttempt) {
        let shard = self.shard(&attempt.signature);
        let mut shard = shard.lock();
        shard
            .records
            .entry(attempt.strategy)
            .or_insert_with(|| PerformanceRecord::empty(attempt.signature.clone(), attempt.strategy))
            .apply(&attempt);
        debug!(
            strategy = %attempt.strategy,
            signature = %attempt.signature,
            outcome = ?attempt.outcome,
            confidence = attempt.confidence,
            latency_ms = attempt.latency_ms,
            "Strategy attempt recorded"
        );
        shard.log.push(attempt);
    }

    pub fn lookup(
        &self,
        signature: &ContentSignature,
        strategy: StrategyKind,
    ) -> Option<PerformanceRecord> {
        self.existing(signature)?.lock().records.get(&strategy).cloned()
    }

    pub fn records_for(&self, signature: &ContentSignature) -> Vec<PerformanceRecord> {
        let Some(shard) = self.existing(signature) else {
            return Vec::new();
        };
        let mut out: Vec<PerformanceRecord> = shard.lock().records.values().cloned().collect();
        out.sort_by_key(|r| r.strategy);
        out
    }

    /// Every aggregate, ordered by signature then strategy.
    pub fn snapshot(&self) -> Vec<PerformanceRecord> {
        let mut out: Vec<PerformanceRecord> = self
            .all_shards()
            .iter()
            .flat_map(|shard| shard.lock().records.values().cloned().collect::<Vec<_>>())
            .collect();
        sort_records(&mut out);
        out
    }

    /// The attempt log across all signatures, oldest first.
    pub fn attempts(&self) -> Vec<StrategyAttempt> {
        let mut out: Vec<StrategyAttempt> = self
            .all_shards()
            .iter()
            .flat_map(|shard| shard.lock().log.clone())
            .collect();
        out.sort_by_key(|a| a.recorded_at);
        out
    }

    pub fn attempt_count(&self) -> usize {
        self.all_shards().iter().map(|shard| shard.lock().log.len()).sum()
    }

    /// Rebuild aggregates from the seeded baseline plus a full fold of the
    /// log. Matches [`PerformanceTracker::snapshot`] up to float rounding.
    pub fn recompute(&self) -> Vec<PerformanceRecord> {
        let mut out: Vec<PerformanceRecord> = Vec::new();
        for shard in self.all_shards() {
            let shard = shard.lock();
            let mut rebuilt = shard.baseline.clone();
            for attempt in &shard.log {
                rebuilt
                    .entry(attempt.strategy)
                    .or_insert_with(|| PerformanceRecord::empty(attempt.signature.clone(), attempt.strategy))
                    .apply(attempt);
            }
            out.extend(rebuilt.into_values());
        }
        sort_records(&mut out);
        out
    }

    /// Merge aggregates persisted in `store`. Returns how many were loaded.
    pub async fn load_from(&self, store: &dyn PlanStore) -> Result<usize> {
        let records = store.load_performance().await?;
        let count = self.seed(records);
        debug!(count, "Loaded strategy performance history");
        Ok(count)
    }

    /// Write every aggregate to `store`.
    pub async fn persist_to(&self, store: &dyn PlanStore) -> Result<()> {
        let snapshot = self.snapshot();
        if let Err(e) = store.save_performance(&snapshot).await {
            warn!(error = %e, records = snapshot.len(), "Failed to persist strategy performance");
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("attempts", &self.attempt_count())
            .field("signatures", &self.shards.read().len())
            .finish()
    }
}

fn sort_records(records: &mut [PerformanceRecord]) {
    records.sort_by(|a, b| {
        a.signature
            .cmp(&b.signature)
            .then(a.strategy.cmp(&b.strategy))
    });
}

fn merge_into(map: &mut HashMap<StrategyKind, PerformanceRecord>, incoming: &PerformanceRecord) {
    let entry = map
        .entry(incoming.strategy)
        .or_insert_with(|| PerformanceRecord::empty(incoming.signature.clone(), incoming.strategy));
    let total = entry.sample_count + incoming.sample_count;
    if total > 0 {
        entry.mean_latency_ms = (entry.mean_latency_ms * entry.sample_count as f64
            + incoming.mean_latency_ms * incoming.sample_count as f64)
            / total as f64;
    }
    entry.sample_count = total;
    entry.success_count += incoming.success_count;
    entry.partial_count += incoming.partial_count;
}

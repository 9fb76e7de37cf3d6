use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::future::join_all;

use scrapewise_core::{
    Comparator, Constraint, ContentSignature, ExtractionConfig, FailureKind, FetchError,
    PerformanceRecord, PlanStore, Result, ScrapeError, Slot, StrategyKind,
};
use scrapewise_llm::MockModelProvider;
use scrapewise_runtime::testing::StaticFetcher;
use scrapewise_runtime::{ExtractionRequest, Pipeline, PipelineBuilder, PipelineOutcome, ShapedResult};
use scrapewise_storage::MemoryStore;
use scrapewise_strategy::as_number;
use scrapewise_strategy::testing::ScriptedStrategy;

const SHOP: &str = "https://shop.example/listing";

const LISTING: &str = r#"<html><body><ul>
<li class="product"><h2 class="product-title">Lamp</h2><span class="price">$30.00</span></li>
<li class="product"><h2 class="product-title">Desk</h2><span class="price">$120.00</span></li>
<li class="product"><h2 class="product-title">Mug</h2><span class="sale-price">$8</span></li>
</ul></body></html>"#;

fn listing_fetcher() -> StaticFetcher {
    StaticFetcher::new().with_page(SHOP, LISTING)
}

fn pipeline() -> Pipeline {
    PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .build()
        .unwrap()
}

fn ask(query: &str, session: &str) -> ExtractionRequest {
    ExtractionRequest::new(query, session, SHOP)
}

fn prices(outcome: &PipelineOutcome) -> Vec<f64> {
    outcome
        .report()
        .expect("extracted")
        .records
        .iter()
        .filter_map(|r| r.get("price").and_then(as_number))
        .collect()
}

#[tokio::test]
async fn scenario_a_prices_under_fifty() {
    let pipeline = pipeline();
    let outcome = pipeline.handle(ask("get all prices under $50", "s-a")).await;

    let report = outcome.report().expect("extracted");
    assert_eq!(report.config.field_names(), vec!["price"]);
    assert!(report.config.field("price").unwrap().filter.is_some());
    assert_eq!(report.strategy, StrategyKind::StructuralSelector);
    assert!(!report.below_threshold);
    assert!(report.confidence >= 0.7);
    assert_eq!(prices(&outcome), vec![30.0, 8.0]);
    assert!(matches!(report.result, ShapedResult::List { ref items } if items.len() == 2));
    assert_eq!(outcome.failure_kind(), None);
}

#[tokio::test]
async fn scenario_b_bare_field_asks_then_resolves() {
    let fetcher = listing_fetcher();
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(fetcher.clone()))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("get the prices", "s-b")).await;
    match &outcome {
        PipelineOutcome::Clarification {
            question,
            unresolved,
            ..
        } => {
            assert!(!question.is_empty());
            assert_eq!(unresolved, &vec![Slot::TargetField]);
        }
        other => panic!("expected clarification, got {:?}", other),
    }
    assert_eq!(outcome.failure_kind(), Some(FailureKind::QueryAmbiguous));
    // Nothing planned, nothing fetched.
    assert_eq!(fetcher.call_count(), 0);

    let outcome = pipeline.handle(ask("all of them", "s-b")).await;
    assert!(outcome.is_extracted(), "{:?}", outcome);
    assert_eq!(prices(&outcome), vec![30.0, 120.0, 8.0]);
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn conflicting_bounds_resolved_by_suggested_reply() {
    let fetcher = listing_fetcher();
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(fetcher.clone()))
        .build()
        .unwrap();

    let outcome = pipeline
        .handle(ask("get all prices under $50 or under $30", "s-conflict"))
        .await;
    let reply = match &outcome {
        PipelineOutcome::Clarification {
            suggestions,
            unresolved,
            ..
        } => {
            assert!(matches!(unresolved.as_slice(), [Slot::Constraint(_)]));
            suggestions[1].reply.clone()
        }
        other => panic!("expected clarification, got {:?}", other),
    };
    assert_eq!(fetcher.call_count(), 0);

    let outcome = pipeline.handle(ask(&reply, "s-conflict")).await;
    let report = outcome.report().expect("extracted");
    assert_eq!(
        report.config.field("price").unwrap().filter,
        Some(Constraint::Bound {
            comparator: Comparator::Lt,
            value: 30.0,
        })
    );
    assert_eq!(prices(&outcome), vec![8.0]);
    assert!(pipeline.conversations().current_unresolved("s-conflict").await.is_empty());
}

#[tokio::test]
async fn disabled_disambiguation_still_gates_intent() {
    let fetcher = listing_fetcher();
    let pipeline = PipelineBuilder::from_yaml("disambiguation:\n  enabled: false\n")
        .unwrap()
        .fetcher(Arc::new(fetcher.clone()))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("prices", "s-gate")).await;
    match &outcome {
        PipelineOutcome::Clarification { unresolved, .. } => {
            assert_eq!(unresolved, &vec![Slot::Operation]);
        }
        other => panic!("expected clarification, got {:?}", other),
    }
    assert_eq!(fetcher.call_count(), 0);

    // Slot checks are off, so a bare field with a clear operation runs.
    let outcome = pipeline.handle(ask("get the prices", "s-gate-2")).await;
    assert!(outcome.is_extracted(), "{:?}", outcome);
}

#[tokio::test]
async fn clarification_without_progress_stalls() {
    let pipeline = pipeline();
    assert!(pipeline.handle(ask("get the prices", "s-stall")).await.is_clarification());

    let outcome = pipeline.handle(ask("hmm", "s-stall")).await;
    match outcome {
        PipelineOutcome::Failed {
            kind, retry_hint, ..
        } => {
            assert_eq!(kind, FailureKind::SessionStalled);
            assert!(retry_hint.is_some());
        }
        other => panic!("expected stall, got {:?}", other),
    }

    // The stall cleared the pending intent; a fresh request works.
    let outcome = pipeline.handle(ask("get all prices under $50", "s-stall")).await;
    assert!(outcome.is_extracted());
}

#[tokio::test]
async fn self_contained_request_abandons_pending() {
    let pipeline = pipeline();
    assert!(pipeline.handle(ask("get the prices", "s-abandon")).await.is_clarification());

    let outcome = pipeline
        .handle(ask("get titles and prices under $50", "s-abandon"))
        .await;
    let report = outcome.report().expect("extracted");
    assert_eq!(report.config.field_names(), vec!["title", "price"]);
    assert_eq!(report.records.len(), 2);

    let summary = pipeline.conversations().summarize("s-abandon").await.unwrap();
    assert!(!summary.is_empty());
    assert!(pipeline.conversations().current_unresolved("s-abandon").await.is_empty());
}

#[tokio::test]
async fn scenario_c_stops_at_first_confident_strategy() {
    let structural = ScriptedStrategy::new(StrategyKind::StructuralSelector).with_confidence(0.4);
    let path = ScriptedStrategy::new(StrategyKind::PathQuery).with_confidence(0.6);
    let pattern = ScriptedStrategy::new(StrategyKind::PatternMatch).with_confidence(0.9);
    let model = Arc::new(MockModelProvider::new("extractor"));

    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .model("default", model.clone())
        .strategy(Arc::new(structural.clone()))
        .strategy(Arc::new(path.clone()))
        .strategy(Arc::new(pattern.clone()))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("get all prices under $50", "s-c")).await;
    let report = outcome.report().expect("extracted");
    assert_eq!(report.strategy, StrategyKind::PatternMatch);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.confidence, 0.9);
    assert_eq!(model.call_count(), 0);

    let logged: Vec<StrategyKind> = pipeline
        .tracker()
        .attempts()
        .iter()
        .map(|a| a.strategy)
        .collect();
    assert_eq!(
        logged,
        vec![
            StrategyKind::StructuralSelector,
            StrategyKind::PathQuery,
            StrategyKind::PatternMatch
        ]
    );

    // The next request for the same page shape tries the proven strategy first.
    let outcome = pipeline.handle(ask("get all prices under $50", "s-c2")).await;
    let report = outcome.report().expect("extracted");
    assert_eq!(report.strategy, StrategyKind::PatternMatch);
    assert_eq!(report.attempts, 1);
    assert_eq!(structural.call_count(), 1);
    assert_eq!(pattern.call_count(), 2);
}

#[tokio::test]
async fn scenario_d_model_partial_returned_below_threshold() {
    let model = Arc::new(MockModelProvider::new("extractor").with_response(
        r#"{"records": [
            {"title": "Lamp", "price": "$30"},
            {"title": "Desk"},
            {"title": "Mug"}
        ]}"#,
    ));

    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .model("default", model.clone())
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::StructuralSelector).with_confidence(0.2),
        ))
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::PathQuery).with_confidence(0.3),
        ))
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::PatternMatch).with_confidence(0.35),
        ))
        .build()
        .unwrap();

    let outcome = pipeline
        .handle(ask("get titles, prices and ratings", "s-d"))
        .await;
    let report = outcome.report().expect("extracted");
    assert_eq!(report.strategy, StrategyKind::ModelAssisted);
    assert!(report.below_threshold);
    assert_eq!(report.attempts, 4);
    // title 3/3, price 1/3, rating 0/3
    assert!((report.confidence - 4.0 / 9.0).abs() < 1e-4);
    assert_eq!(
        outcome.failure_kind(),
        Some(FailureKind::AllStrategiesBelowThreshold)
    );
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn no_records_from_any_strategy() {
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::StructuralSelector).with_confidence(0.0),
        ))
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::PathQuery).with_confidence(0.0),
        ))
        .strategy(Arc::new(
            ScriptedStrategy::new(StrategyKind::PatternMatch).with_confidence(0.0),
        ))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("get all prices under $50", "s-none")).await;
    assert_eq!(
        outcome.failure_kind(),
        Some(FailureKind::AllStrategiesBelowThreshold)
    );
    assert!(!outcome.is_extracted());
}

#[tokio::test]
async fn scenario_e_expired_session_starts_fresh() {
    let pipeline = pipeline();
    assert!(pipeline.handle(ask("get the prices", "s-e")).await.is_clarification());
    assert!(pipeline.conversations().contains("s-e"));

    let evicted = pipeline
        .conversations()
        .evict_expired_at(Utc::now() + Duration::minutes(31));
    assert_eq!(evicted, 1);
    assert!(!pipeline.conversations().contains("s-e"));

    // Without the earlier turn "all of them" names nothing to extract.
    let outcome = pipeline.handle(ask("all of them", "s-e")).await;
    assert!(outcome.is_clarification(), "{:?}", outcome);
    let summary = pipeline.conversations().summarize("s-e").await.unwrap();
    assert_eq!(summary.turn_count, 1);
}

#[tokio::test]
async fn sessions_are_independent() {
    let pipeline = Arc::new(pipeline());
    assert!(pipeline.handle(ask("get the prices", "s-one")).await.is_clarification());

    let (a, b) = tokio::join!(
        pipeline.handle(ask("all of them", "s-one")),
        pipeline.handle(ask("all of them", "s-two")),
    );
    assert!(a.is_extracted());
    assert!(b.is_clarification());
}

#[tokio::test]
async fn concurrent_sessions_all_complete() {
    let pipeline = Arc::new(pipeline());
    let requests = (0..8).map(|i| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            pipeline
                .handle(ask("get all prices under $50", &format!("s-many-{}", i)))
                .await
        }
    });

    let outcomes = join_all(requests).await;
    assert!(outcomes.iter().all(PipelineOutcome::is_extracted));
    assert_eq!(pipeline.conversations().len(), 8);
    assert_eq!(pipeline.tracker().attempt_count(), 8);
    let records = pipeline.tracker().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sample_count, 8);
}

#[tokio::test]
async fn fetch_timeout_is_service_unavailable() {
    let pipeline = PipelineBuilder::from_yaml("fetch_timeout_ms: 20\n")
        .unwrap()
        .fetcher(Arc::new(listing_fetcher().with_delay_ms(500)))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("get all prices under $50", "s-slow")).await;
    match outcome {
        PipelineOutcome::Failed {
            kind, retry_hint, ..
        } => {
            assert_eq!(kind, FailureKind::ExternalServiceUnavailable);
            assert!(kind.is_operational());
            assert!(retry_hint.is_some());
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn blocked_fetch_is_service_unavailable() {
    let fetcher = listing_fetcher().with_error(
        SHOP,
        FetchError::Blocked {
            url: SHOP.into(),
            reason: "captcha".into(),
        },
    );
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(fetcher))
        .build()
        .unwrap();
    let outcome = pipeline.handle(ask("get all prices under $50", "s-blocked")).await;
    assert_eq!(
        outcome.failure_kind(),
        Some(FailureKind::ExternalServiceUnavailable)
    );
}

#[tokio::test]
async fn missing_template_is_intent_unrecognized() {
    let pipeline = PipelineBuilder::from_yaml("planning:\n  templates: [extract, filter]\n")
        .unwrap()
        .fetcher(Arc::new(listing_fetcher()))
        .build()
        .unwrap();
    let outcome = pipeline
        .handle(ask("compare titles and prices", "s-compare"))
        .await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::IntentUnrecognized));
}

#[tokio::test]
async fn blank_request_is_invalid() {
    let pipeline = pipeline();
    for request in [
        ask("   ", "s1"),
        ask("get all prices", ""),
        ExtractionRequest::new("get all prices", "s1", ""),
    ] {
        let outcome = pipeline.handle(request).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidRequest));
    }
    assert!(pipeline.conversations().is_empty());
}

#[tokio::test]
async fn accepted_config_and_performance_are_stored() {
    let store = MemoryStore::new();
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .store(Arc::new(store.clone()))
        .build()
        .unwrap();

    let outcome = pipeline.handle(ask("get all prices under $50", "s-store")).await;
    let report = outcome.report().expect("extracted");

    assert!(!report.cached_config);
    let cached = store
        .get_config(&report.signature, &report.request_key)
        .await
        .unwrap();
    assert_eq!(cached.as_ref(), Some(&report.config));
    assert_eq!(store.performance_count(), 1);

    // A second pipeline over the same store starts with the learned history.
    let restored = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .store(Arc::new(store.clone()))
        .build()
        .unwrap();
    assert_eq!(restored.restore_performance().await, 1);
    assert_eq!(restored.tracker().records_for(&report.signature).len(), 1);
}

#[tokio::test]
async fn repeated_request_reuses_cached_config() {
    let store = MemoryStore::new();
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .store(Arc::new(store.clone()))
        .build()
        .unwrap();

    let first = pipeline.handle(ask("get all prices under $50", "s-reuse-1")).await;
    let first = first.report().expect("extracted");
    assert!(!first.cached_config);

    let second = pipeline.handle(ask("get all prices under $50", "s-reuse-2")).await;
    assert_eq!(prices(&second), vec![30.0, 8.0]);
    let second = second.report().expect("extracted");
    assert!(second.cached_config);
    assert_eq!(second.request_key, first.request_key);
    assert_eq!(second.config, first.config);
    assert_eq!(store.config_count(), 1);

    // A different request on the same page shape builds its own plan.
    let other = pipeline.handle(ask("get all titles and prices", "s-reuse-3")).await;
    let other = other.report().expect("extracted");
    assert!(!other.cached_config);
    assert_ne!(other.request_key, first.request_key);
    assert_eq!(store.config_count(), 2);
}

struct UnavailableStore;

#[async_trait]
impl PlanStore for UnavailableStore {
    async fn get_config(&self, _: &ContentSignature, _: &str) -> Result<Option<ExtractionConfig>> {
        Err(ScrapeError::Storage("store offline".into()))
    }

    async fn put_config(&self, _: &ContentSignature, _: &str, _: &ExtractionConfig) -> Result<()> {
        Err(ScrapeError::Storage("store offline".into()))
    }

    async fn load_performance(&self) -> Result<Vec<PerformanceRecord>> {
        Err(ScrapeError::Storage("store offline".into()))
    }

    async fn save_performance(&self, _: &[PerformanceRecord]) -> Result<()> {
        Err(ScrapeError::Storage("store offline".into()))
    }
}

#[tokio::test]
async fn unavailable_store_degrades_to_default_order() {
    let pipeline = PipelineBuilder::new()
        .fetcher(Arc::new(listing_fetcher()))
        .store(Arc::new(UnavailableStore))
        .build()
        .unwrap();

    assert_eq!(pipeline.restore_performance().await, 0);
    let outcome = pipeline.handle(ask("get all prices under $50", "s-offline")).await;
    assert!(outcome.is_extracted());
    assert_eq!(pipeline.tracker().attempt_count(), 1);
}

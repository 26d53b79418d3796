//! Metrics, observers, configuration loading and the category registry.

mod common;

use ai_guard_rust::cache::CacheConfig;
use ai_guard_rust::telemetry::InMemoryObserver;
use ai_guard_rust::{
    CircuitPhase, Error, FailureKind, GuardConfig, GuardEvent, GuardRegistry, ResilientExecutor,
};
use common::{failing, ok, req, single_attempt, Calls};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_metrics_snapshot_and_reset() {
    let guard: ResilientExecutor<String> = ResilientExecutor::new("analyze_food", single_attempt()).unwrap();
    let calls = Calls::new();

    guard.execute(&req("eggs"), ok(&calls, "150 kcal")).await.unwrap();
    guard.execute(&req("eggs"), ok(&calls, "150 kcal")).await.unwrap();
    guard
        .execute(&req("toast"), failing(&calls, Error::network("reset")))
        .await
        .unwrap_err();

    let m = guard.metrics();
    assert_eq!(m.total_requests, 3);
    assert_eq!(m.cache_hits, 1);
    assert_eq!(m.cache_misses, 2);
    assert_eq!(m.executions, 2);
    assert_eq!(m.successes, 1);
    assert_eq!(m.failures_of(FailureKind::Network), 1);
    assert!((m.cache_hit_ratio() - 1.0 / 3.0).abs() < 1e-9);

    guard.reset_metrics();
    let m = guard.metrics();
    assert_eq!(m.total_requests, 0);
    assert_eq!(m.total_failures(), 0);
    assert!(m.transitions.is_empty());

    // Resetting counters leaves circuit and cache alone.
    assert_eq!(guard.state().consecutive_failures, 1);
    assert_eq!(guard.execute(&req("eggs"), ok(&calls, "x")).await.unwrap(), "150 kcal");
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_still_executes() {
    let guard: ResilientExecutor<String> =
        ResilientExecutor::new("analyze_food", single_attempt().with_metrics(false)).unwrap();
    let calls = Calls::new();
    guard.execute(&req("eggs"), ok(&calls, "150 kcal")).await.unwrap();
    assert_eq!(guard.metrics().total_requests, 0);
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_decision_sequence() {
    let observer = Arc::new(InMemoryObserver::new(64));
    let guard: ResilientExecutor<String> = ResilientExecutor::new("analyze_food", single_attempt())
        .unwrap()
        .with_observer(observer.clone());
    let calls = Calls::new();

    guard.execute(&req("eggs"), ok(&calls, "150 kcal")).await.unwrap();
    guard.execute(&req("eggs"), ok(&calls, "150 kcal")).await.unwrap();

    let names: Vec<String> = observer
        .events_for("analyze_food")
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["request", "cache_miss", "attempt", "success", "request", "cache_hit"]
    );
    assert!(observer.events_for("other").is_empty());
    assert!(matches!(
        observer.events()[2].1,
        GuardEvent::Attempt { attempt: 0, probe: false }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_yaml_config_drives_executor() {
    let yaml = r#"
request_timeout_ms: 2000
circuit:
  failure_threshold: 2
  cooldown_ms: 1000
cache:
  ttl_ms: 500
retry:
  max_attempts: 1
"#;
    let config = GuardConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.request_timeout, Duration::from_secs(2));
    assert_eq!(config.circuit.success_threshold, 3);
    assert_eq!(config.cache.capacity, 100);

    let guard: ResilientExecutor<String> = ResilientExecutor::new("transcribe_audio", config).unwrap();
    let calls = Calls::new();
    for i in 0..2 {
        guard
            .execute(&req(format!("clip-{i}")), failing(&calls, Error::remote(500, "boom")))
            .await
            .unwrap_err();
    }
    assert_eq!(guard.state().phase, CircuitPhase::Open);
    assert_eq!(guard.state().cooldown_ms, 1000);
    assert_eq!(calls.count(), 2);
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let config = GuardConfig::default().with_cache(CacheConfig::new().with_capacity(0));
    let err = ResilientExecutor::<String>::new("analyze_food", config).err().unwrap();
    match err {
        Error::Configuration { context, .. } => {
            assert_eq!(context.field_path.as_deref(), Some("cache.capacity"));
        }
        other => panic!("expected Configuration, got {other:?}"),
    }

    let err = GuardConfig::from_json_str(r#"{"retry": {"multiplier": 0.5}}"#).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_registry_isolates_categories() {
    let observer = Arc::new(InMemoryObserver::new(256));
    let registry: GuardRegistry<String> = GuardRegistry::new(single_attempt())
        .unwrap()
        .with_observer(observer.clone());
    let calls = Calls::new();

    let food = registry.get_or_create("analyze_food");
    for i in 0..5 {
        food.execute(&req(format!("f{i}")), failing(&calls, Error::network("down")))
            .await
            .unwrap_err();
    }
    let audio = registry.get_or_create("transcribe_audio");
    audio.execute(&req("clip"), ok(&calls, "hello")).await.unwrap();

    assert_eq!(food.state().phase, CircuitPhase::Open);
    assert_eq!(audio.state().phase, CircuitPhase::Closed);
    assert_eq!(
        registry.get("analyze_food").unwrap().state().phase,
        CircuitPhase::Open
    );

    let signals = registry.signals();
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].category, "analyze_food");
    assert_eq!(signals[1].cache_entries, 1);

    assert!(!observer.events_for("analyze_food").is_empty());
    assert!(!observer.events_for("transcribe_audio").is_empty());

    registry.reset_all();
    assert_eq!(food.state().phase, CircuitPhase::Closed);
    assert_eq!(audio.signals().cache_entries, 0);
}

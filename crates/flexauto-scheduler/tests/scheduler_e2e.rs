//! End-to-end: a persisted cyclic scenario fires through the polling loop,
//! updates the store and broadcasts exactly once per cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use flexauto_core::config::SchedulerConfig;
use flexauto_core::traits::ScenarioStore;
use flexauto_core::types::Scenario;
use flexauto_scheduler::{BlockHeader, Scheduler, Services, SqliteStore, serialize_chain};

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_ms: 50,
        error_backoff_ms: 200,
        drain_timeout_ms: 500,
        settle_delay_ms: 10,
        min_start_jitter_ms: 1,
        max_start_jitter_ms: 10,
        shutdown_timeout_ms: 2000,
    }
}

fn cyclic_scenario(seconds: &str) -> Scenario {
    let trigger = BlockHeader::new("CyclicTrigger")
        .with_param("Interval", seconds)
        .with_param("Unit", "Seconds");
    let delay = BlockHeader::new("Delay").with_param("Milliseconds", "10");
    Scenario::new("cycle")
        .with_blocks(serialize_chain(&[trigger, delay]).unwrap())
        .activated()
}

#[tokio::test]
async fn test_cyclic_scenario_fires_once_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("flex.db")).unwrap());

    let seeded = Utc::now();
    let mut scenario = cyclic_scenario("1");
    scenario.last_executed = Some(seeded);
    store.add_scenario(&scenario).await.unwrap();

    let scheduler = Scheduler::new(Services::new(store.clone()), test_config());
    let mut rx = scheduler.subscribe();
    let summary = scheduler.start(None).await.unwrap();
    assert_eq!(summary.polling, 1);

    let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("scenario should fire within the interval")
        .unwrap();
    assert_eq!(event.scenario_id, scenario.id);
    assert!(event.executed_at >= seeded + TimeDelta::seconds(1));

    // No second run before the next cycle is due.
    let second = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
    assert!(second.is_err());

    let stored = store.scenario(scenario.id).await.unwrap().unwrap();
    assert_eq!(
        stored.last_executed.map(|t| t.timestamp_millis()),
        Some(event.executed_at.timestamp_millis())
    );

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_reload_replaces_removed_scenarios() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let scenario = cyclic_scenario("3600");
    store.add_scenario(&scenario).await.unwrap();

    let scheduler = Scheduler::new(Services::new(store.clone()), test_config());
    let first = scheduler.reload().await.unwrap();
    assert_eq!(first.polling, 1);

    store.delete_scenario(scenario.id).await.unwrap();
    let second = scheduler.reload().await.unwrap();
    assert_eq!(second.polling, 0);
    assert_eq!(second.generation, first.generation + 1);

    let third = scheduler.reload().await.unwrap();
    assert_eq!(third.polling, second.polling);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_disabled_scenario_never_runs() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut scenario = cyclic_scenario("1");
    scenario.is_active = false;
    store.add_scenario(&scenario).await.unwrap();

    let scheduler = Scheduler::new(Services::new(store.clone()), test_config());
    let mut rx = scheduler.subscribe();
    let summary = scheduler.start(None).await.unwrap();
    assert_eq!(summary.polling, 0);

    let fired = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(fired.is_err());
    scheduler.shutdown().await;
}

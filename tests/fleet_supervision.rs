//! Integration tests for leasing and health supervision.
//!
//! Each test builds its own ledger and supervisor over a `MockClock`, feeds
//! snapshots through the public API, and checks the documented behaviour.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use fleet_warden::assignment::{REASON_ORPHANED, REASON_RECOVERY, REASON_STALE};
use fleet_warden::container::{Container, ContainerStatus, TaskType};
use fleet_warden::health::{
    CheckOutcome, FleetSnapshot, HealthSupervisor, NavStatus, ShipSnapshot, WorkerHealth,
};
use fleet_warden::{AssignmentError, Clock, MockClock, ShipAssignmentManager, SupervisorConfig};

const MINUTE: Duration = Duration::from_secs(60);

struct Harness {
    clock: Arc<MockClock>,
    manager: Arc<ShipAssignmentManager>,
    supervisor: HealthSupervisor,
}

fn harness(config: SupervisorConfig) -> Harness {
    let clock = Arc::new(MockClock::new(
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
    ));
    let manager = Arc::new(ShipAssignmentManager::new(clock.clone()));
    let supervisor = HealthSupervisor::new(Arc::clone(&manager), clock.clone(), config);
    Harness {
        clock,
        manager,
        supervisor,
    }
}

fn running_task(h: &Harness, id: &str) -> Container {
    let mut task = Container::new(id, TaskType::Navigate, 1, 50, h.clock.as_ref()).unwrap();
    task.start(h.clock.as_ref()).unwrap();
    task
}

#[tokio::test]
async fn conflicting_assign_keeps_first_lease() {
    let h = harness(SupervisorConfig::default());
    h.manager.assign("SHIP-1", 1, "c1").await.unwrap();

    let err = h.manager.assign("SHIP-1", 1, "c2").await.unwrap_err();
    assert!(matches!(err, AssignmentError::AlreadyAssigned { .. }));
    assert_eq!(h.manager.get("SHIP-1").await.unwrap().task_id(), "c1");
}

#[tokio::test]
async fn orphan_cleanup_example() {
    let h = harness(SupervisorConfig::default());
    h.manager.assign("SHIP-1", 1, "c1").await.unwrap();
    h.manager.assign("SHIP-2", 1, "c2").await.unwrap();

    let existing: HashSet<String> = ["c1".to_string()].into_iter().collect();
    let count = h
        .manager
        .clean_orphaned(&existing, &CancellationToken::new())
        .await;

    assert_eq!(count, 1);
    assert!(h.manager.is_assigned("SHIP-1").await);
    assert_eq!(
        h.manager.get("SHIP-2").await.unwrap().release_reason(),
        Some(REASON_ORPHANED)
    );
}

#[tokio::test]
async fn supervisor_reclaims_with_recovery_timeout() {
    let h = harness(SupervisorConfig {
        recovery_timeout: 30 * MINUTE,
        ..SupervisorConfig::default()
    });
    h.manager.assign("SHIP-1", 1, "c1").await.unwrap();
    h.clock.advance(31 * MINUTE);
    h.manager.assign("SHIP-2", 1, "c2").await.unwrap();

    let existing: HashSet<String> = ["c1".to_string(), "c2".to_string()].into_iter().collect();
    let count = h
        .supervisor
        .clean_stale_assignments(&existing, &CancellationToken::new())
        .await;

    assert_eq!(count, 1);
    assert_eq!(
        h.manager.get("SHIP-1").await.unwrap().release_reason(),
        Some(REASON_STALE)
    );
    assert!(h.manager.is_assigned("SHIP-2").await);
}

#[tokio::test]
async fn stuck_ship_is_recovered_by_releasing_its_lease() {
    let h = harness(SupervisorConfig::default());
    h.manager.assign("SHIP-1", 1, "c1").await.unwrap();

    let snapshot = FleetSnapshot::new()
        .with_task(running_task(&h, "c1"))
        .with_ship(
            ShipSnapshot::new("SHIP-1", 1, NavStatus::InTransit, h.clock.now()).with_task("c1"),
        );

    let outcome = h
        .supervisor
        .run_check(snapshot, &CancellationToken::new())
        .await
        .unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.recovered, vec!["SHIP-1".to_string()]);
    assert_eq!(
        h.manager.get("SHIP-1").await.unwrap().release_reason(),
        Some(REASON_RECOVERY)
    );
    assert_eq!(h.supervisor.metrics().await.successful_recoveries, 1);
    assert_eq!(
        h.supervisor.worker_health("SHIP-1").await,
        WorkerHealth::Healthy
    );
    assert_eq!(h.supervisor.recovery_attempt_count("SHIP-1").await, 1);

    // The ship can be leased again straight away.
    h.manager.assign("SHIP-1", 1, "c3").await.unwrap();
}

#[tokio::test]
async fn persistently_stuck_ship_is_abandoned_after_bounded_passes() {
    let h = harness(SupervisorConfig {
        check_interval: MINUTE,
        max_recovery_attempts: 2,
        ..SupervisorConfig::default()
    });
    // No lease: the default recovery action cannot free the ship.
    let snapshot = FleetSnapshot::new().with_ship(ShipSnapshot::new(
        "SHIP-7",
        1,
        NavStatus::InTransit,
        h.clock.now(),
    ));
    let token = CancellationToken::new();

    let mut abandoned_in_pass = Vec::new();
    for pass in 0..5 {
        let outcome = h.supervisor.run_check(snapshot.clone(), &token).await.unwrap();
        let CheckOutcome::Completed(report) = outcome else {
            panic!("pass {pass} should run");
        };
        if !report.abandoned.is_empty() {
            abandoned_in_pass.push(pass);
        }
        h.clock.advance(MINUTE);
    }

    assert_eq!(abandoned_in_pass, vec![2, 3, 4]);
    let metrics = h.supervisor.metrics().await;
    assert_eq!(metrics.failed_recoveries, 3);
    assert_eq!(metrics.abandoned_workers, 1);
    assert_eq!(
        h.supervisor.worker_health("SHIP-7").await,
        WorkerHealth::Abandoned
    );

    h.supervisor.remove_from_watch_list("SHIP-7").await;
    assert_eq!(h.supervisor.recovery_attempt_count("SHIP-7").await, 0);
    assert_eq!(
        h.supervisor.worker_health("SHIP-7").await,
        WorkerHealth::Healthy
    );
}

#[tokio::test]
async fn runaway_task_is_reported_but_stopped_task_is_not() {
    let h = harness(SupervisorConfig::default());

    let mut runaway = running_task(&h, "runaway");
    let mut stopped = running_task(&h, "stopped");
    for _ in 0..40 {
        runaway.increment_iteration(h.clock.as_ref()).unwrap();
        stopped.increment_iteration(h.clock.as_ref()).unwrap();
    }
    runaway.record_runtime(Duration::from_secs(2));
    stopped.record_runtime(Duration::from_secs(2));
    stopped.stop(h.clock.as_ref()).unwrap();
    stopped.mark_stopped(h.clock.as_ref()).unwrap();
    assert_eq!(stopped.status(), ContainerStatus::Stopped);

    let tasks: HashMap<String, Container> = [runaway, stopped]
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();
    assert_eq!(
        h.supervisor.detect_infinite_loops(&tasks).await,
        vec!["runaway".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assigns_across_ships_stay_exclusive() {
    let h = harness(SupervisorConfig::default());
    let manager = Arc::clone(&h.manager);

    let mut handles = Vec::new();
    for ship in 0..8 {
        for task in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .assign(&format!("SHIP-{ship}"), 1, &format!("c{ship}-{task}"))
                    .await
                    .is_ok()
            }));
        }
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }

    assert_eq!(granted, 8);
    assert_eq!(manager.active_assignments().await.len(), 8);
}

//! Health supervisor — stale-lease reclamation, stuck-ship detection and
//! bounded recovery.
//!
//! The supervisor does not schedule itself. A driver (see
//! [`spawn_health_monitor`](super::monitor::spawn_health_monitor)) calls
//! [`HealthSupervisor::run_check`] as often as it likes; passes closer together
//! than `check_interval` are skipped.
//!
//! Per-ship lifecycle: Healthy → UnderRecovery → Healthy, or UnderRecovery →
//! Abandoned once `max_recovery_attempts` have been spent. Abandonment is
//! terminal until the ship is removed from the watch list. A recovered ship
//! stays watched and keeps its attempt count, but reports Healthy until it is
//! detected stuck again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assignment::ShipAssignmentManager;
use crate::clock::{Clock, elapsed_since};
use crate::config::SupervisorConfig;
use crate::container::Container;
use crate::error::SupervisorError;
use crate::health::detect;
use crate::health::recovery::{RecoveryAction, ReleaseLeaseRecovery};
use crate::health::snapshot::{FleetSnapshot, ShipSnapshot};

/// Aggregate recovery counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryMetrics {
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    pub abandoned_workers: u64,
}

/// Supervisory view of one ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerHealth {
    Healthy,
    UnderRecovery,
    Abandoned,
}

/// Result of one [`HealthSupervisor::attempt_recovery`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Recovered,
    StillStuck,
    /// Attempts exhausted; no action was taken.
    Abandoned,
}

/// What a supervision pass found and did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Stale or orphaned leases reclaimed.
    pub reclaimed: usize,
    pub stuck_ships: Vec<String>,
    pub suspicious_tasks: Vec<String>,
    pub recovered: Vec<String>,
    pub still_stuck: Vec<String>,
    /// Ships abandoned during this pass, or skipped because they already were.
    pub abandoned: Vec<String>,
    /// Recovery attempts that could not be made.
    pub recovery_errors: usize,
}

/// Outcome of [`HealthSupervisor::run_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Debounced; nothing was done.
    Skipped,
    /// Full pass ran and `last_check_time` advanced.
    Completed(CheckReport),
    /// Cancelled part-way; `last_check_time` was not advanced.
    Interrupted(CheckReport),
}

impl CheckOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn report(&self) -> Option<&CheckReport> {
        match self {
            Self::Skipped => None,
            Self::Completed(report) | Self::Interrupted(report) => Some(report),
        }
    }
}

#[derive(Debug)]
struct SupervisorState {
    config: SupervisorConfig,
    last_check_time: Option<DateTime<Utc>>,
    recovery_attempts: HashMap<String, u32>,
    watch_list: HashSet<String>,
    /// Watched ships whose latest attempt succeeded.
    recovered: HashSet<String>,
    abandoned: HashSet<String>,
    metrics: RecoveryMetrics,
}

impl SupervisorState {
    fn record_attempt(&mut self, ship_id: &str, success: bool) -> u32 {
        self.watch_list.insert(ship_id.to_string());
        let count = self.recovery_attempts.entry(ship_id.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if success {
            self.recovered.insert(ship_id.to_string());
            self.metrics.successful_recoveries += 1;
        } else {
            self.recovered.remove(ship_id);
            self.metrics.failed_recoveries += 1;
        }
        count
    }
}

/// Periodic fleet health supervisor.
pub struct HealthSupervisor {
    manager: Arc<ShipAssignmentManager>,
    clock: Arc<dyn Clock>,
    recovery: Arc<dyn RecoveryAction>,
    state: Mutex<SupervisorState>,
    /// Held for the duration of a pass so overlapping drivers skip instead of doubling up.
    pass: Mutex<()>,
}

impl HealthSupervisor {
    /// Create a supervisor that recovers ships by releasing their leases.
    pub fn new(
        manager: Arc<ShipAssignmentManager>,
        clock: Arc<dyn Clock>,
        config: SupervisorConfig,
    ) -> Self {
        let recovery = Arc::new(ReleaseLeaseRecovery::new(Arc::clone(&manager)));
        Self::with_recovery(manager, clock, config, recovery)
    }

    /// Create a supervisor with a custom recovery action.
    pub fn with_recovery(
        manager: Arc<ShipAssignmentManager>,
        clock: Arc<dyn Clock>,
        config: SupervisorConfig,
        recovery: Arc<dyn RecoveryAction>,
    ) -> Self {
        Self {
            manager,
            clock,
            recovery,
            state: Mutex::new(SupervisorState {
                config,
                last_check_time: None,
                recovery_attempts: HashMap::new(),
                watch_list: HashSet::new(),
                recovered: HashSet::new(),
                abandoned: HashSet::new(),
                metrics: RecoveryMetrics::default(),
            }),
            pass: Mutex::new(()),
        }
    }

    pub fn manager(&self) -> &Arc<ShipAssignmentManager> {
        &self.manager
    }

    /// Run one supervision pass if `check_interval` has elapsed since the last one.
    pub async fn run_check(
        &self,
        snapshot: FleetSnapshot,
        cancel: &CancellationToken,
    ) -> Result<CheckOutcome, SupervisorError> {
        let Ok(_pass) = self.pass.try_lock() else {
            debug!("Health check already in progress, skipping");
            return Ok(CheckOutcome::Skipped);
        };

        let now = self.clock.now();
        let config = {
            let state = self.state.lock().await;
            if let Some(last) = state.last_check_time
                && elapsed_since(now, last) < state.config.check_interval
            {
                debug!(last_check = %last, "Health check skipped, interval not elapsed");
                return Ok(CheckOutcome::Skipped);
            }
            state.config.clone()
        };

        let mut report = CheckReport {
            reclaimed: self
                .clean_stale_assignments(&snapshot.existing_task_ids(), cancel)
                .await,
            ..CheckReport::default()
        };
        if cancel.is_cancelled() {
            return Ok(CheckOutcome::Interrupted(report));
        }

        report.stuck_ships = detect::detect_stuck_workers(
            &snapshot.ships,
            &snapshot.tasks,
            &snapshot.active_routes,
            now,
            config.stuck_grace,
        );
        report.suspicious_tasks = detect::detect_infinite_loops(
            &snapshot.tasks,
            config.max_iteration_rate,
            config.min_loop_iterations,
        );
        for task_id in &report.suspicious_tasks {
            if let Some(task) = snapshot.tasks.get(task_id) {
                warn!(
                    task_id = %task_id,
                    task_type = %task.task_type,
                    iteration = task.current_iteration(),
                    runtime_secs = ?task.metadata.runtime_seconds(),
                    "Possible infinite loop"
                );
            }
        }

        for ship_id in &report.stuck_ships {
            self.add_to_watch_list(ship_id).await;
        }

        for ship_id in report.stuck_ships.clone() {
            if cancel.is_cancelled() {
                return Ok(CheckOutcome::Interrupted(report));
            }
            let Some(ship) = snapshot.ships.get(&ship_id) else {
                continue;
            };
            if self.is_abandoned(&ship_id).await {
                report.abandoned.push(ship_id);
                continue;
            }

            match self.attempt_recovery(ship, &snapshot.tasks).await {
                Ok(RecoveryOutcome::Recovered) => report.recovered.push(ship_id),
                Ok(RecoveryOutcome::StillStuck) => report.still_stuck.push(ship_id),
                Ok(RecoveryOutcome::Abandoned) => report.abandoned.push(ship_id),
                Err(e) => {
                    warn!(ship_id = %ship_id, error = %e, "Recovery could not be attempted");
                    report.recovery_errors += 1;
                }
            }
        }

        self.state.lock().await.last_check_time = Some(now);

        info!(
            reclaimed = report.reclaimed,
            stuck = report.stuck_ships.len(),
            suspicious = report.suspicious_tasks.len(),
            recovered = report.recovered.len(),
            abandoned = report.abandoned.len(),
            "Health check completed"
        );
        Ok(CheckOutcome::Completed(report))
    }

    /// Reclaim orphaned leases, then leases older than `recovery_timeout`.
    pub async fn clean_stale_assignments(
        &self,
        existing_task_ids: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> usize {
        let timeout = self.state.lock().await.config.recovery_timeout;
        let orphaned = self.manager.clean_orphaned(existing_task_ids, cancel).await;
        let stale = self.manager.clean_stale(timeout, cancel).await;
        orphaned + stale
    }

    /// Ships that look stuck, using the live `stuck_grace`.
    pub async fn detect_stuck_workers(
        &self,
        ships: &HashMap<String, ShipSnapshot>,
        tasks: &HashMap<String, Container>,
        active_routes: &HashSet<String>,
    ) -> Vec<String> {
        let grace = self.state.lock().await.config.stuck_grace;
        detect::detect_stuck_workers(ships, tasks, active_routes, self.clock.now(), grace)
    }

    /// Running tasks iterating implausibly fast.
    pub async fn detect_infinite_loops(&self, tasks: &HashMap<String, Container>) -> Vec<String> {
        let (rate, min) = {
            let state = self.state.lock().await;
            (
                state.config.max_iteration_rate,
                state.config.min_loop_iterations,
            )
        };
        detect::detect_infinite_loops(tasks, rate, min)
    }

    /// Try to recover one ship, or abandon it once its attempts are spent.
    ///
    /// A ship that already has `max_recovery_attempts` recorded gets this
    /// attempt recorded as a failure and is abandoned without running the
    /// action; the abandonment metric moves once per ship. An `Err` means the
    /// action could not run and nothing was recorded.
    pub async fn attempt_recovery(
        &self,
        ship: &ShipSnapshot,
        tasks: &HashMap<String, Container>,
    ) -> Result<RecoveryOutcome, SupervisorError> {
        let ship_id = ship.ship_id.as_str();

        {
            let mut state = self.state.lock().await;
            let attempts = state.recovery_attempts.get(ship_id).copied().unwrap_or(0);
            if attempts >= state.config.max_recovery_attempts {
                state.record_attempt(ship_id, false);
                if state.abandoned.insert(ship_id.to_string()) {
                    state.metrics.abandoned_workers += 1;
                    warn!(ship_id = %ship_id, attempts, "Abandoning ship after exhausting recovery attempts");
                }
                return Ok(RecoveryOutcome::Abandoned);
            }
        }

        let recovered = self.recovery.recover(ship, tasks).await?;
        let attempt = self.record_recovery_attempt(ship_id, recovered).await;

        if recovered {
            info!(ship_id = %ship_id, attempt, "Ship recovered");
            Ok(RecoveryOutcome::Recovered)
        } else {
            warn!(ship_id = %ship_id, attempt, "Recovery attempt failed");
            Ok(RecoveryOutcome::StillStuck)
        }
    }

    /// Count a recovery attempt. The ship is put on the watch list if absent.
    /// Returns the ship's attempt count after recording.
    pub async fn record_recovery_attempt(&self, ship_id: &str, success: bool) -> u32 {
        self.state.lock().await.record_attempt(ship_id, success)
    }

    /// Watch a ship as under recovery. Clears an earlier recovered mark.
    pub async fn add_to_watch_list(&self, ship_id: &str) {
        let mut state = self.state.lock().await;
        state.recovered.remove(ship_id);
        if state.watch_list.insert(ship_id.to_string()) {
            debug!(ship_id = %ship_id, "Ship added to watch list");
        }
    }

    /// Forget a ship: drops it from the watch list and clears its attempts and abandonment.
    pub async fn remove_from_watch_list(&self, ship_id: &str) {
        let mut state = self.state.lock().await;
        state.watch_list.remove(ship_id);
        state.recovery_attempts.remove(ship_id);
        state.recovered.remove(ship_id);
        state.abandoned.remove(ship_id);
    }

    pub async fn is_watched(&self, ship_id: &str) -> bool {
        self.state.lock().await.watch_list.contains(ship_id)
    }

    /// Watched ship ids, sorted.
    pub async fn watch_list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.watch_list.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Recorded attempts for a ship; zero when it is not tracked.
    pub async fn recovery_attempt_count(&self, ship_id: &str) -> u32 {
        self.state
            .lock()
            .await
            .recovery_attempts
            .get(ship_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn is_abandoned(&self, ship_id: &str) -> bool {
        self.state.lock().await.abandoned.contains(ship_id)
    }

    pub async fn worker_health(&self, ship_id: &str) -> WorkerHealth {
        let state = self.state.lock().await;
        if state.abandoned.contains(ship_id) {
            WorkerHealth::Abandoned
        } else if state.watch_list.contains(ship_id) && !state.recovered.contains(ship_id) {
            WorkerHealth::UnderRecovery
        } else {
            WorkerHealth::Healthy
        }
    }

    pub async fn metrics(&self) -> RecoveryMetrics {
        self.state.lock().await.metrics
    }

    pub async fn config(&self) -> SupervisorConfig {
        self.state.lock().await.config.clone()
    }

    pub async fn set_max_recovery_attempts(&self, max: u32) {
        self.state.lock().await.config.max_recovery_attempts = max;
    }

    pub async fn set_check_interval(&self, interval: Duration) {
        self.state.lock().await.config.check_interval = interval;
    }

    pub async fn set_recovery_timeout(&self, timeout: Duration) {
        self.state.lock().await.config.recovery_timeout = timeout;
    }

    pub async fn last_check_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_check_time
    }

    /// Override the last pass time (operational reset, tests).
    pub async fn set_last_check_time(&self, time: Option<DateTime<Utc>>) {
        self.state.lock().await.last_check_time = time;
    }
}

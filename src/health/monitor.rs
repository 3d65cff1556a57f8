//! Health monitor loop — drives the supervisor on a fixed tick.
//!
//! Ticks may be much more frequent than `check_interval`; the supervisor's
//! debounce decides when a pass actually runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::health::snapshot::FleetSnapshot;
use crate::health::supervisor::{CheckOutcome, HealthSupervisor};

/// Supplies fresh fleet state from the repositories.
#[async_trait]
pub trait FleetSnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Result<FleetSnapshot, SupervisorError>;
}

/// Spawn the monitor loop. It exits when `cancel` fires.
pub fn spawn_health_monitor(
    supervisor: Arc<HealthSupervisor>,
    source: Arc<dyn FleetSnapshotSource>,
    tick: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Health monitor started (tick: {}ms)", tick.as_millis());

        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            run_monitor_tick(&supervisor, source.as_ref(), &cancel).await;
        }

        info!("Health monitor stopped");
    })
}

/// One tick: fetch a snapshot and hand it to the supervisor.
async fn run_monitor_tick(
    supervisor: &HealthSupervisor,
    source: &dyn FleetSnapshotSource,
    cancel: &CancellationToken,
) {
    let snapshot = match source.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "Failed to load fleet snapshot, will retry next tick");
            return;
        }
    };

    match supervisor.run_check(snapshot, cancel).await {
        Ok(CheckOutcome::Skipped) => {}
        Ok(CheckOutcome::Completed(report)) => {
            if !report.abandoned.is_empty() {
                warn!(ships = ?report.abandoned, "Ships abandoned by health supervisor");
            }
        }
        Ok(CheckOutcome::Interrupted(report)) => {
            debug!(reclaimed = report.reclaimed, "Health check interrupted");
        }
        Err(e) => warn!(error = %e, "Health check failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::assignment::ShipAssignmentManager;
    use crate::clock::SystemClock;
    use crate::config::SupervisorConfig;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FleetSnapshotSource for CountingSource {
        async fn snapshot(&self) -> Result<FleetSnapshot, SupervisorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                return Err(SupervisorError::Snapshot("repository warming up".into()));
            }
            Ok(FleetSnapshot::new())
        }
    }

    #[tokio::test]
    async fn loop_ticks_until_cancelled() {
        let clock = Arc::new(SystemClock);
        let manager = Arc::new(ShipAssignmentManager::new(clock.clone()));
        let supervisor = Arc::new(HealthSupervisor::new(
            manager,
            clock,
            SupervisorConfig::default(),
        ));
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();

        let handle = spawn_health_monitor(
            Arc::clone(&supervisor),
            source.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while supervisor.last_check_time().await.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("monitor should complete a pass");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor should stop")
            .unwrap();

        // First snapshot failed, a later one succeeded.
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }
}

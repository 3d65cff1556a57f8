//! Assignment ledger — at most one active lease per ship.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assignment::lease::{REASON_ORPHANED, REASON_STALE, ShipAssignment};
use crate::clock::Clock;
use crate::error::AssignmentError;
use crate::validation::{validate_player_id, validate_ship_id, validate_task_id};

/// Concurrency-safe store of ship leases, keyed by ship id.
///
/// Released records are kept until the ship is leased again, so callers can
/// still read why a ship was let go.
pub struct ShipAssignmentManager {
    assignments: RwLock<HashMap<String, ShipAssignment>>,
    clock: Arc<dyn Clock>,
}

impl ShipAssignmentManager {
    /// Create an empty ledger.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            assignments: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// The clock this ledger stamps leases with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Lease `ship_id` to `task_id`.
    ///
    /// The existing-lease check and the insert run under one write lock, so two
    /// racing callers can never both win the same ship.
    pub async fn assign(
        &self,
        ship_id: &str,
        player_id: i64,
        task_id: &str,
    ) -> Result<ShipAssignment, AssignmentError> {
        validate_ship_id(ship_id)?;
        validate_task_id(task_id)?;
        validate_player_id(player_id)?;

        let mut assignments = self.assignments.write().await;
        if let Some(existing) = assignments.get(ship_id)
            && existing.is_active()
        {
            debug!(
                ship_id = %ship_id,
                held_by = %existing.task_id(),
                requested_by = %task_id,
                "Lease conflict"
            );
            return Err(AssignmentError::AlreadyAssigned {
                ship_id: ship_id.to_string(),
                task_id: existing.task_id().to_string(),
            });
        }

        let assignment = ShipAssignment::new(ship_id, player_id, task_id, self.clock.as_ref());
        assignments.insert(ship_id.to_string(), assignment.clone());
        drop(assignments);

        info!(ship_id = %ship_id, task_id = %task_id, player_id, "Ship assigned");
        Ok(assignment)
    }

    /// Look up the lease record for a ship (active or released).
    pub async fn get(&self, ship_id: &str) -> Option<ShipAssignment> {
        self.assignments.read().await.get(ship_id).cloned()
    }

    /// Whether the ship currently holds an active lease.
    pub async fn is_assigned(&self, ship_id: &str) -> bool {
        self.assignments
            .read()
            .await
            .get(ship_id)
            .is_some_and(ShipAssignment::is_active)
    }

    /// Release a ship's lease. Fails on unknown ships and on double release.
    pub async fn release(&self, ship_id: &str, reason: &str) -> Result<(), AssignmentError> {
        let mut assignments = self.assignments.write().await;
        let assignment = assignments
            .get_mut(ship_id)
            .ok_or_else(|| AssignmentError::NotFound {
                ship_id: ship_id.to_string(),
            })?;
        assignment.release(reason, self.clock.as_ref())?;

        info!(ship_id = %ship_id, reason = %reason, "Ship released");
        Ok(())
    }

    /// Release a ship's lease even if it was already released.
    pub async fn force_release(&self, ship_id: &str, reason: &str) -> Result<(), AssignmentError> {
        let mut assignments = self.assignments.write().await;
        let assignment = assignments
            .get_mut(ship_id)
            .ok_or_else(|| AssignmentError::NotFound {
                ship_id: ship_id.to_string(),
            })?;
        assignment.force_release(reason, self.clock.as_ref());

        info!(ship_id = %ship_id, reason = %reason, "Ship force-released");
        Ok(())
    }

    /// Force-release the ship's lease only if it is still active.
    ///
    /// Check and release run under one write lock. Returns `false` when the
    /// ship has no record or its lease was already released, leaving that
    /// record's reason untouched.
    pub async fn release_if_active(&self, ship_id: &str, reason: &str) -> bool {
        let mut assignments = self.assignments.write().await;
        let Some(assignment) = assignments.get_mut(ship_id).filter(|a| a.is_active()) else {
            return false;
        };
        assignment.force_release(reason, self.clock.as_ref());

        info!(ship_id = %ship_id, reason = %reason, "Active lease force-released");
        true
    }

    /// Force-release every active lease. Returns how many were released.
    pub async fn release_all(&self, reason: &str, cancel: &CancellationToken) -> usize {
        let released = self.reclaim_where(reason, cancel, |_| true).await;
        if released > 0 {
            info!(count = released, reason = %reason, "Released all active assignments");
        }
        released
    }

    /// Reclaim active leases whose task id is not in `existing_task_ids`.
    pub async fn clean_orphaned(
        &self,
        existing_task_ids: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> usize {
        let reclaimed = self
            .reclaim_where(REASON_ORPHANED, cancel, |a| {
                !existing_task_ids.contains(a.task_id())
            })
            .await;
        if reclaimed > 0 {
            info!(count = reclaimed, "Reclaimed orphaned assignments");
        }
        reclaimed
    }

    /// Reclaim active leases older than `timeout`.
    pub async fn clean_stale(&self, timeout: Duration, cancel: &CancellationToken) -> usize {
        let clock = Arc::clone(&self.clock);
        let reclaimed = self
            .reclaim_where(REASON_STALE, cancel, |a| a.is_stale(timeout, clock.as_ref()))
            .await;
        if reclaimed > 0 {
            info!(
                count = reclaimed,
                timeout_secs = timeout.as_secs(),
                "Reclaimed stale assignments"
            );
        }
        reclaimed
    }

    /// Force-release every active lease matching `predicate`.
    ///
    /// Each record is updated whole, so stopping early on cancellation leaves
    /// the ledger consistent; the next pass picks up the rest.
    async fn reclaim_where<P>(&self, reason: &str, cancel: &CancellationToken, predicate: P) -> usize
    where
        P: Fn(&ShipAssignment) -> bool,
    {
        let mut assignments = self.assignments.write().await;
        let mut reclaimed = 0;

        for assignment in assignments.values_mut() {
            if cancel.is_cancelled() {
                debug!(reclaimed, reason = %reason, "Reclaim scan cancelled");
                break;
            }
            if !assignment.is_active() || !predicate(assignment) {
                continue;
            }
            assignment.force_release(reason, self.clock.as_ref());
            debug!(
                ship_id = %assignment.ship_id(),
                task_id = %assignment.task_id(),
                reason = %reason,
                "Lease reclaimed"
            );
            reclaimed += 1;
        }

        reclaimed
    }

    /// All currently active leases.
    pub async fn active_assignments(&self) -> Vec<ShipAssignment> {
        let mut active: Vec<ShipAssignment> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.ship_id().cmp(b.ship_id()));
        active
    }

    /// The active lease pointing at `task_id`, if any.
    pub async fn find_by_task(&self, task_id: &str) -> Option<ShipAssignment> {
        self.assignments
            .read()
            .await
            .values()
            .find(|a| a.is_active() && a.task_id() == task_id)
            .cloned()
    }

    /// Counts of all records by status.
    pub async fn summary(&self) -> AssignmentSummary {
        let assignments = self.assignments.read().await;
        let active = assignments.values().filter(|a| a.is_active()).count();
        AssignmentSummary {
            total: assignments.len(),
            active,
            released: assignments.len() - active,
        }
    }
}

/// Summary of the ledger.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignmentSummary {
    pub total: usize,
    pub active: usize,
    pub released: usize,
}

//! Ship assignment lease — one ship bound to one task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, elapsed_since};
use crate::error::AssignmentError;

/// Release reason used when the referenced container no longer exists.
pub const REASON_ORPHANED: &str = "orphaned_container";
/// Release reason used when a lease outlives the configured timeout.
pub const REASON_STALE: &str = "stale_timeout";
/// Release reason used by shutdown/reset paths.
pub const REASON_SHUTDOWN: &str = "shutdown";
/// Release reason used when the supervisor reclaims a stuck ship.
pub const REASON_RECOVERY: &str = "recovery";

/// Status of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Released,
}

impl AssignmentStatus {
    /// Check if this status allows moving to `target` through a normal release.
    pub fn can_transition_to(&self, target: AssignmentStatus) -> bool {
        matches!((self, target), (Self::Active, Self::Released))
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Released => "released",
        };
        write!(f, "{s}")
    }
}

/// A lease binding `ship_id` to `task_id`.
///
/// `released_at` and `release_reason` are set together, exactly when the
/// status becomes `Released`. Fields are read-only outside this module so the
/// pairing cannot be broken by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipAssignment {
    ship_id: String,
    player_id: i64,
    task_id: String,
    status: AssignmentStatus,
    assigned_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
    release_reason: Option<String>,
}

impl ShipAssignment {
    /// Create an active lease stamped with the clock's current time.
    ///
    /// Production code obtains leases through
    /// [`ShipAssignmentManager::assign`](super::ShipAssignmentManager::assign);
    /// direct construction is for fixtures.
    pub fn new(
        ship_id: impl Into<String>,
        player_id: i64,
        task_id: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            ship_id: ship_id.into(),
            player_id,
            task_id: task_id.into(),
            status: AssignmentStatus::Active,
            assigned_at: clock.now(),
            released_at: None,
            release_reason: None,
        }
    }

    pub fn ship_id(&self) -> &str {
        &self.ship_id
    }

    pub fn player_id(&self) -> i64 {
        self.player_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn status(&self) -> AssignmentStatus {
        self.status
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    pub fn release_reason(&self) -> Option<&str> {
        self.release_reason.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }

    /// Release the lease. Fails if it was already released.
    pub fn release(
        &mut self,
        reason: impl Into<String>,
        clock: &dyn Clock,
    ) -> Result<(), AssignmentError> {
        if !self.status.can_transition_to(AssignmentStatus::Released) {
            return Err(AssignmentError::AlreadyReleased {
                ship_id: self.ship_id.clone(),
                reason: self.release_reason.clone().unwrap_or_default(),
            });
        }
        self.mark_released(reason.into(), clock.now());
        Ok(())
    }

    /// Release the lease unconditionally, overwriting any earlier release.
    pub fn force_release(&mut self, reason: impl Into<String>, clock: &dyn Clock) {
        self.mark_released(reason.into(), clock.now());
    }

    fn mark_released(&mut self, reason: String, at: DateTime<Utc>) {
        self.status = AssignmentStatus::Released;
        self.released_at = Some(at);
        self.release_reason = Some(reason);
    }

    /// Time since the lease was granted.
    pub fn age(&self, clock: &dyn Clock) -> Duration {
        elapsed_since(clock.now(), self.assigned_at)
    }

    /// Active and strictly older than `timeout`. Released leases are never stale.
    pub fn is_stale(&self, timeout: Duration, clock: &dyn Clock) -> bool {
        self.is_active() && self.age(clock) > timeout
    }
}

impl std::fmt::Display for ShipAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ShipAssignment[ship={}, player={}, task={}, status={}",
            self.ship_id, self.player_id, self.task_id, self.status
        )?;
        if let Some(reason) = &self.release_reason {
            write!(f, ", reason={reason}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::MockClock;

    fn clock() -> MockClock {
        MockClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap())
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn new_assignment_is_active() {
        let clock = clock();
        let a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);

        assert!(a.is_active());
        assert_eq!(a.assigned_at(), clock.now());
        assert!(a.released_at().is_none());
        assert!(a.release_reason().is_none());
    }

    #[test]
    fn release_sets_time_and_reason_together() {
        let clock = clock();
        let mut a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        clock.advance(MINUTE);

        a.release("done", &clock).unwrap();
        assert_eq!(a.status(), AssignmentStatus::Released);
        assert_eq!(a.released_at(), Some(clock.now()));
        assert_eq!(a.release_reason(), Some("done"));
    }

    #[test]
    fn double_release_fails() {
        let clock = clock();
        let mut a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        a.release("first", &clock).unwrap();

        let err = a.release("second", &clock).unwrap_err();
        assert_eq!(
            err,
            AssignmentError::AlreadyReleased {
                ship_id: "SHIP-1".into(),
                reason: "first".into()
            }
        );
        assert_eq!(a.release_reason(), Some("first"));
    }

    #[test]
    fn force_release_overwrites() {
        let clock = clock();
        let mut a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        a.release("first", &clock).unwrap();
        clock.advance(MINUTE);

        a.force_release("cleanup", &clock);
        assert_eq!(a.release_reason(), Some("cleanup"));
        assert_eq!(a.released_at(), Some(clock.now()));
    }

    #[test]
    fn staleness_after_31_minutes() {
        let clock = clock();
        let a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        clock.advance(31 * MINUTE);

        assert!(a.is_stale(30 * MINUTE, &clock));
        assert!(!a.is_stale(32 * MINUTE, &clock));
        // Boundary is strict.
        assert!(!a.is_stale(31 * MINUTE, &clock));
    }

    #[test]
    fn staleness_is_monotonic_in_timeout() {
        let clock = clock();
        let a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        clock.advance(10 * MINUTE);
        let age = a.age(&clock);

        for secs in (0..1200).step_by(30) {
            let timeout = Duration::from_secs(secs);
            assert_eq!(a.is_stale(timeout, &clock), timeout < age, "timeout {secs}s");
        }
    }

    #[test]
    fn released_assignment_is_never_stale() {
        let clock = clock();
        let mut a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        a.release("done", &clock).unwrap();
        clock.advance(120 * MINUTE);

        assert!(!a.is_stale(MINUTE, &clock));
    }

    #[test]
    fn display_includes_reason_once_released() {
        let clock = clock();
        let mut a = ShipAssignment::new("SHIP-1", 1, "c1", &clock);
        let active = a.to_string();
        assert!(active.contains("SHIP-1"));
        assert!(active.contains("active"));
        assert!(!active.contains("reason"));

        a.force_release(REASON_STALE, &clock);
        let released = a.to_string();
        assert!(released.contains("released"));
        assert!(released.contains("reason=stale_timeout"));
    }
}

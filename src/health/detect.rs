//! Stuck-ship and runaway-loop detection. Pure functions over snapshots.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::container::{Container, ContainerStatus};
use crate::health::snapshot::{NavStatus, ShipSnapshot};

/// Why a ship was judged stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckReason {
    /// In transit, but nothing is driving it.
    NoActiveRoute,
    /// Past its expected arrival plus grace, with no progress since departure.
    OverdueArrival,
}

/// Classify one ship. `None` means healthy.
pub fn stuck_reason(
    ship: &ShipSnapshot,
    tasks: &HashMap<String, Container>,
    active_routes: &HashSet<String>,
    now: DateTime<Utc>,
    stuck_grace: Duration,
) -> Option<StuckReason> {
    if ship.nav_status != NavStatus::InTransit {
        return None;
    }

    // A ship whose task is being stopped is expected to go quiet.
    if let Some(task) = ship.task_id.as_ref().and_then(|id| tasks.get(id))
        && task.status() == ContainerStatus::Stopping
    {
        return None;
    }

    if !active_routes.contains(&ship.ship_id) {
        return Some(StuckReason::NoActiveRoute);
    }

    let grace = chrono::Duration::from_std(stuck_grace).unwrap_or(chrono::Duration::MAX);
    let overdue = ship
        .expected_arrival
        .and_then(|arrival| arrival.checked_add_signed(grace))
        .is_some_and(|deadline| now > deadline);

    if overdue && !ship.has_progress_since_status() {
        return Some(StuckReason::OverdueArrival);
    }

    None
}

/// Ids of every stuck ship, sorted.
pub fn detect_stuck_workers(
    ships: &HashMap<String, ShipSnapshot>,
    tasks: &HashMap<String, Container>,
    active_routes: &HashSet<String>,
    now: DateTime<Utc>,
    stuck_grace: Duration,
) -> Vec<String> {
    let mut stuck: Vec<String> = ships
        .values()
        .filter(|ship| stuck_reason(ship, tasks, active_routes, now, stuck_grace).is_some())
        .map(|ship| ship.ship_id.clone())
        .collect();
    stuck.sort();
    stuck
}

/// Whether a task's iteration rate is implausibly high for real work.
///
/// Only bounded, running tasks with at least `min_iterations` are judged. A
/// zero or missing runtime with that many iterations counts as an unbounded
/// rate.
pub fn is_suspicious_loop(task: &Container, max_rate: f64, min_iterations: i64) -> bool {
    if task.status() != ContainerStatus::Running || !task.is_bounded() {
        return false;
    }
    if task.current_iteration() < min_iterations.max(1) {
        return false;
    }
    match task.iteration_rate() {
        Some(rate) => rate > max_rate,
        None => true,
    }
}

/// Ids of tasks that look like runaway loops, sorted.
pub fn detect_infinite_loops(
    tasks: &HashMap<String, Container>,
    max_rate: f64,
    min_iterations: i64,
) -> Vec<String> {
    let mut suspicious: Vec<String> = tasks
        .values()
        .filter(|task| is_suspicious_loop(task, max_rate, min_iterations))
        .map(|task| task.id.clone())
        .collect();
    suspicious.sort();
    suspicious
}

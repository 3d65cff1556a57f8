//! Point-in-time fleet state handed to the supervisor.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::Container;

/// Navigation status reported by a ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavStatus {
    InTransit,
    InOrbit,
    Docked,
}

impl std::fmt::Display for NavStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InTransit => "in_transit",
            Self::InOrbit => "in_orbit",
            Self::Docked => "docked",
        };
        write!(f, "{s}")
    }
}

/// What a ship last reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub ship_id: String,
    pub player_id: i64,
    pub nav_status: NavStatus,
    /// When the ship entered `nav_status`.
    pub status_since: DateTime<Utc>,
    /// Expected arrival while in transit.
    pub expected_arrival: Option<DateTime<Utc>>,
    /// Last time the executor saw the ship make progress.
    pub last_progress_at: Option<DateTime<Utc>>,
    /// Container the ship is working for, if any.
    pub task_id: Option<String>,
}

impl ShipSnapshot {
    pub fn new(
        ship_id: impl Into<String>,
        player_id: i64,
        nav_status: NavStatus,
        status_since: DateTime<Utc>,
    ) -> Self {
        Self {
            ship_id: ship_id.into(),
            player_id,
            nav_status,
            status_since,
            expected_arrival: None,
            last_progress_at: None,
            task_id: None,
        }
    }

    pub fn with_arrival(mut self, arrival: DateTime<Utc>) -> Self {
        self.expected_arrival = Some(arrival);
        self
    }

    pub fn with_progress(mut self, at: DateTime<Utc>) -> Self {
        self.last_progress_at = Some(at);
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Progress was observed after the ship entered its current status.
    pub fn has_progress_since_status(&self) -> bool {
        self.last_progress_at
            .is_some_and(|at| at > self.status_since)
    }
}

/// Tasks, ships and active routes as read from the repositories for one pass.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub tasks: HashMap<String, Container>,
    pub ships: HashMap<String, ShipSnapshot>,
    /// Ships with an active navigation route or plan.
    pub active_routes: HashSet<String>,
}

impl FleetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: Container) -> Self {
        self.tasks.insert(task.id.clone(), task);
        self
    }

    pub fn with_ship(mut self, ship: ShipSnapshot) -> Self {
        self.ships.insert(ship.ship_id.clone(), ship);
        self
    }

    pub fn with_route(mut self, ship_id: impl Into<String>) -> Self {
        self.active_routes.insert(ship_id.into());
        self
    }

    /// Ids of every task that still exists.
    pub fn existing_task_ids(&self) -> HashSet<String> {
        self.tasks.keys().cloned().collect()
    }
}

//! Container state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::container::metadata::ContainerMetadata;
use crate::error::{AssignmentError, ContainerError};
use crate::validation::validate_task_id;

/// Kind of work a container performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Navigate,
    Mining,
    ScoutTour,
    ScoutMarkets,
    ContractWorkflow,
    Purchase,
    FleetAssignment,
    Other,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Navigate => "navigate",
            Self::Mining => "mining",
            Self::ScoutTour => "scout_tour",
            Self::ScoutMarkets => "scout_markets",
            Self::ContractWorkflow => "contract_workflow",
            Self::Purchase => "purchase",
            Self::FleetAssignment => "fleet_assignment",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Status of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Created, not yet started.
    Pending,
    /// Executing iterations.
    Running,
    /// Stop requested, executor winding down.
    Stopping,
    /// Stopped on request.
    Stopped,
    /// Reached its iteration bound or finished its work.
    Completed,
    /// Task body reported an error.
    Failed,
}

impl ContainerStatus {
    /// Check if this status allows transitioning to `target`.
    pub fn can_transition_to(&self, target: ContainerStatus) -> bool {
        use ContainerStatus::*;

        matches!(
            (self, target),
            // From Pending
            (Pending, Running) | (Pending, Stopping) | (Pending, Failed) |
            // From Running
            (Running, Stopping) | (Running, Completed) | (Running, Failed) |
            // From Stopping
            (Stopping, Stopped) | (Stopping, Failed)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A generic unit of work with a bounded-iteration lifecycle.
///
/// Owned by the executor that created it. The supervisor only ever sees
/// cloned snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub task_type: TaskType,
    pub owner_id: i64,
    /// `<= 0` means unbounded.
    max_iterations: i64,
    current_iteration: i64,
    status: ContainerStatus,
    pub metadata: ContainerMetadata,
    last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl Container {
    /// Create a pending container.
    pub fn new(
        id: impl Into<String>,
        task_type: TaskType,
        owner_id: i64,
        max_iterations: i64,
        clock: &dyn Clock,
    ) -> Result<Self, ContainerError> {
        let id = id.into();
        // Container ids are the ledger's task ids.
        validate_task_id(&id).map_err(|e| match e {
            AssignmentError::Validation { field, reason } => {
                ContainerError::Validation { field, reason }
            }
            other => ContainerError::Validation {
                field: "id".to_string(),
                reason: other.to_string(),
            },
        })?;

        let now = clock.now();
        Ok(Self {
            id,
            task_type,
            owner_id,
            max_iterations,
            current_iteration: 0,
            status: ContainerStatus::Pending,
            metadata: ContainerMetadata::default(),
            last_error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        })
    }

    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    pub fn max_iterations(&self) -> i64 {
        self.max_iterations
    }

    pub fn current_iteration(&self) -> i64 {
        self.current_iteration
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_bounded(&self) -> bool {
        self.max_iterations > 0
    }

    fn transition_to(
        &mut self,
        target: ContainerStatus,
        clock: &dyn Clock,
    ) -> Result<(), ContainerError> {
        if !self.status.can_transition_to(target) {
            return Err(ContainerError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = clock.now();
        self.status = target;
        self.updated_at = now;

        match target {
            ContainerStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(now);
            }
            ContainerStatus::Stopped | ContainerStatus::Completed | ContainerStatus::Failed => {
                self.finished_at = Some(now);
            }
            _ => {}
        }

        Ok(())
    }

    /// Pending → Running.
    pub fn start(&mut self, clock: &dyn Clock) -> Result<(), ContainerError> {
        self.transition_to(ContainerStatus::Running, clock)
    }

    /// Count one finished iteration. Completes the container when the bound is reached.
    pub fn increment_iteration(&mut self, clock: &dyn Clock) -> Result<(), ContainerError> {
        if self.status != ContainerStatus::Running {
            return Err(ContainerError::NotRunning {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }

        self.current_iteration += 1;
        self.updated_at = clock.now();

        if self.is_bounded() && self.current_iteration >= self.max_iterations {
            self.transition_to(ContainerStatus::Completed, clock)?;
        }
        Ok(())
    }

    /// Running → Completed, for unbounded work that finishes on its own terms.
    pub fn complete(&mut self, clock: &dyn Clock) -> Result<(), ContainerError> {
        self.transition_to(ContainerStatus::Completed, clock)
    }

    /// Request a stop. The executor confirms with [`Container::mark_stopped`].
    pub fn stop(&mut self, clock: &dyn Clock) -> Result<(), ContainerError> {
        self.transition_to(ContainerStatus::Stopping, clock)
    }

    /// Stopping → Stopped.
    pub fn mark_stopped(&mut self, clock: &dyn Clock) -> Result<(), ContainerError> {
        self.transition_to(ContainerStatus::Stopped, clock)
    }

    /// Record a task failure.
    pub fn fail(&mut self, error: impl Into<String>, clock: &dyn Clock) -> Result<(), ContainerError> {
        self.transition_to(ContainerStatus::Failed, clock)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Executors report elapsed runtime here; loop detection reads it.
    pub fn record_runtime(&mut self, runtime: std::time::Duration) {
        self.metadata.runtime = Some(runtime);
    }

    /// Whether the executor should run another iteration.
    pub fn should_continue(&self) -> bool {
        self.status == ContainerStatus::Running
            && (!self.is_bounded() || self.current_iteration < self.max_iterations)
    }

    /// Iterations per second of reported runtime.
    ///
    /// `None` when no runtime was reported; infinite when runtime is zero but
    /// iterations were counted.
    pub fn iteration_rate(&self) -> Option<f64> {
        let secs = self.metadata.runtime_seconds()?;
        if secs > 0.0 {
            Some(self.current_iteration as f64 / secs)
        } else if self.current_iteration > 0 {
            Some(f64::INFINITY)
        } else {
            Some(0.0)
        }
    }
}

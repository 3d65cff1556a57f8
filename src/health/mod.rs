//! Fleet health supervision.
//!
//! - `snapshot` — ship and fleet snapshots fed into each pass
//! - `detect` — stuck-ship and runaway-loop detection
//! - `recovery` — `RecoveryAction` seam and the lease-release default
//! - `supervisor` — `HealthSupervisor`, debounced passes and bounded recovery
//! - `monitor` — periodic driver loop

pub mod detect;
pub mod monitor;
pub mod recovery;
pub mod snapshot;
pub mod supervisor;

pub use monitor::{FleetSnapshotSource, spawn_health_monitor};
pub use recovery::{RecoveryAction, ReleaseLeaseRecovery};
pub use snapshot::{FleetSnapshot, NavStatus, ShipSnapshot};
pub use supervisor::{
    CheckOutcome, CheckReport, HealthSupervisor, RecoveryMetrics, RecoveryOutcome, WorkerHealth,
};

//! Ship assignment ledger.
//!
//! - `lease` — the `ShipAssignment` record (Active → Released)
//! - `manager` — `ShipAssignmentManager`, the exclusivity ledger

pub mod lease;
pub mod manager;

pub use lease::{
    AssignmentStatus, REASON_ORPHANED, REASON_RECOVERY, REASON_SHUTDOWN, REASON_STALE,
    ShipAssignment,
};
pub use manager::{AssignmentSummary, ShipAssignmentManager};

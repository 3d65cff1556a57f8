//! Fleet Warden — ship leasing and fleet health supervision.

pub mod assignment;
pub mod clock;
pub mod config;
pub mod container;
pub mod error;
pub mod health;
pub mod validation;

pub use assignment::{ShipAssignment, ShipAssignmentManager};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::SupervisorConfig;
pub use container::{Container, ContainerStatus, TaskType};
pub use error::{AssignmentError, ContainerError, Error, Result, SupervisorError};
pub use health::{FleetSnapshot, HealthSupervisor, ShipSnapshot};

//! Recovery actions the supervisor can apply to a stuck ship.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::assignment::{REASON_RECOVERY, ShipAssignmentManager};
use crate::container::Container;
use crate::error::SupervisorError;
use crate::health::snapshot::ShipSnapshot;

/// A bounded attempt to unstick one ship.
///
/// `Ok(true)` means the ship was recovered, `Ok(false)` means the attempt ran
/// but the ship is still stuck. `Err` is reserved for the case where the
/// attempt could not be made at all.
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    async fn recover(
        &self,
        ship: &ShipSnapshot,
        tasks: &HashMap<String, Container>,
    ) -> Result<bool, SupervisorError>;
}

/// Default action: reclaim the ship's lease so it can be re-tasked.
pub struct ReleaseLeaseRecovery {
    manager: Arc<ShipAssignmentManager>,
}

impl ReleaseLeaseRecovery {
    pub fn new(manager: Arc<ShipAssignmentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl RecoveryAction for ReleaseLeaseRecovery {
    async fn recover(
        &self,
        ship: &ShipSnapshot,
        _tasks: &HashMap<String, Container>,
    ) -> Result<bool, SupervisorError> {
        // A lease released elsewhere in the meantime is left as it is.
        let released = self
            .manager
            .release_if_active(&ship.ship_id, REASON_RECOVERY)
            .await;
        if released {
            info!(ship_id = %ship.ship_id, "Released lease of stuck ship");
        }
        Ok(released)
    }
}

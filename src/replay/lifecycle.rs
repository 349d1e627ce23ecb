//! Group activation around a replay.

use std::sync::Arc;

use tracing::{debug, warn};

use super::ReplayError;
use crate::client::ProtocolClient;
use crate::utils::ids::encode_pk;

/// Activates non-home groups for the duration of their replay.
///
/// Activation is always local only: replay reads what the service already
/// holds and never joins the network for a group.
pub struct GroupLifecycle {
    client: Arc<dyn ProtocolClient>,
}

impl GroupLifecycle {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self { client }
    }

    pub async fn activate(&self, group_pk: &[u8]) -> Result<(), ReplayError> {
        debug!(group = %encode_pk(group_pk), "Activating group");
        self.client
            .activate_group(group_pk, true)
            .await
            .map_err(|source| ReplayError::GroupActivate {
                group: encode_pk(group_pk),
                source,
            })
    }

    pub async fn deactivate(&self, group_pk: &[u8]) -> Result<(), ReplayError> {
        debug!(group = %encode_pk(group_pk), "Deactivating group");
        self.client
            .deactivate_group(group_pk)
            .await
            .map_err(|source| ReplayError::GroupDeactivate {
                group: encode_pk(group_pk),
                source,
            })
    }

    /// Deactivate after a failed replay step. The step's error is what the
    /// caller reports, so a failure here is only logged.
    pub async fn release_after_failure(&self, group_pk: &[u8]) {
        if let Err(e) = self.client.deactivate_group(group_pk).await {
            warn!(
                group = %encode_pk(group_pk),
                error = %e,
                "Failed to deactivate group after replay failure"
            );
        }
    }
}

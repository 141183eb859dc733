//! Power-state probe
//!
//! Reads the VM's expanded instance view through a [`ComputeClient`] and
//! extracts the power-state code. Every failure mode is converted into a
//! [`ProbeError`]; nothing panics across this boundary.

use crate::compute::client::{ComputeClient, ComputeError};
use crate::incident::VmStatus;
use tracing::debug;

/// Position of the power-state entry in the instance view's status
/// collection. The provider orders statuses with provisioning state first
/// and power state second; the index is relied on as observed rather than
/// matched on the code prefix.
const POWER_STATE_INDEX: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The underlying status query failed.
    #[error("status query failed: {0}")]
    Query(#[from] ComputeError),

    /// The provider answered without an instance view.
    #[error("no instance view was returned for the VM")]
    MissingInstanceView,

    /// The instance view carried too few status entries to contain a
    /// power state.
    #[error("instance view carried {found} status entries, no power state at position 1")]
    MissingPowerState { found: usize },
}

/// Read-only probe for the monitored VM's current power state.
pub struct StatusProbe<C: ComputeClient> {
    client: C,
}

impl<C: ComputeClient> StatusProbe<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Query the provider and return the current power-state code.
    pub async fn probe(&self) -> Result<VmStatus, ProbeError> {
        let view = self
            .client
            .instance_view()
            .await?
            .ok_or(ProbeError::MissingInstanceView)?;

        let entry = view
            .statuses
            .get(POWER_STATE_INDEX)
            .ok_or(ProbeError::MissingPowerState {
                found: view.statuses.len(),
            })?;

        debug!(code = %entry.code, "Observed VM power state");
        Ok(VmStatus::new(entry.code.clone()))
    }
}

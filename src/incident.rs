//! Incident types shared across the monitoring pipeline
//!
//! An incident is created at the moment a power-state transition is judged
//! alert-worthy. It is shipped to the log-ingestion API and embedded in
//! operator notifications, then discarded — nothing is persisted locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Power-state code reported for a healthy VM.
pub const RUNNING_STATUS: &str = "PowerState/running";

/// Opaque power-state code as reported by the compute provider
/// (e.g. `PowerState/running`, `PowerState/stopped`, `PowerState/deallocated`).
///
/// Only equality matters to the monitor; the code is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatus(String);

impl VmStatus {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The status every monitor starts from.
    pub fn running() -> Self {
        Self(RUNNING_STATUS.to_string())
    }

    pub fn is_running(&self) -> bool {
        self.0 == RUNNING_STATUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VmStatus {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for VmStatus {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

/// Identity of the monitored resource, fixed at configuration time.
#[derive(Debug, Clone)]
pub struct ResourceId {
    pub resource_group: String,
    pub vm_name: String,
}

/// Generate a fresh incident reference id (canonical UUIDv4 string).
///
/// Ids carry no ordering; they only need to be collision-free for the
/// process lifetime.
pub fn new_incident_id() -> String {
    Uuid::new_v4().to_string()
}

/// One alert-worthy power-state transition.
///
/// Immutable once created.
#[derive(Debug, Clone)]
pub struct IncidentRecord {
    /// Incident reference id (UUIDv4).
    pub id: String,
    /// When the transition was observed (UTC).
    pub timestamp: DateTime<Utc>,
    /// The resource the transition belongs to.
    pub resource: ResourceId,
    /// Status observed on the previous poll.
    pub previous_status: VmStatus,
    /// Status observed on this poll.
    pub new_status: VmStatus,
    /// Optional human-facing context attached by the caller.
    pub message: Option<String>,
}

impl IncidentRecord {
    pub fn new(resource: &ResourceId, previous_status: VmStatus, new_status: VmStatus) -> Self {
        Self {
            id: new_incident_id(),
            timestamp: Utc::now(),
            resource: resource.clone(),
            previous_status,
            new_status,
            message: None,
        }
    }

    /// Attach a human-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_recognize_running_status() {
        // Arrange
        let running = VmStatus::new("PowerState/running");
        let stopped = VmStatus::new("PowerState/stopped");

        // Act & Assert
        assert!(running.is_running());
        assert!(!stopped.is_running());
        assert_eq!(VmStatus::running(), running);
    }

    #[test]
    fn should_compare_statuses_by_equality_only() {
        // Arrange
        let a = VmStatus::new("PowerState/deallocated");
        let b = VmStatus::from("PowerState/deallocated".to_string());

        // Act & Assert
        assert_eq!(a, b);
        assert_ne!(a, VmStatus::new("PowerState/stopped"));
    }

    #[test]
    fn should_generate_canonical_uuid_v4_ids() {
        // Act
        let id = new_incident_id();

        // Assert - canonical form: 8-4-4-4-12 with the version nibble set to 4
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        assert_eq!(&id[14..15], "4");
    }

    #[test]
    fn should_generate_distinct_ids_per_call() {
        // Act
        let first = new_incident_id();
        let second = new_incident_id();

        // Assert
        assert_ne!(first, second);
    }

    #[test]
    fn should_create_incident_with_fresh_id_and_message() {
        // Arrange
        let resource = ResourceId {
            resource_group: "VMs".to_string(),
            vm_name: "app-vm-01".to_string(),
        };

        // Act
        let incident = IncidentRecord::new(
            &resource,
            VmStatus::running(),
            VmStatus::new("PowerState/stopped"),
        )
        .with_message("VM left the running state");

        // Assert
        assert_eq!(incident.resource.vm_name, "app-vm-01");
        assert_eq!(incident.previous_status, VmStatus::running());
        assert_eq!(incident.new_status.as_str(), "PowerState/stopped");
        assert_eq!(incident.message.as_deref(), Some("VM left the running state"));
        assert_eq!(incident.id.len(), 36);
    }
}

//! Monitor loop and debounce state machine
//!
//! Polls the VM power state on a fixed cadence and fires the alerting chain
//! on the first departure from `PowerState/running`. Subsequent non-running
//! observations are suppressed until the VM runs again, so a VM that stays
//! down produces exactly one alert per outage instead of one per poll.

use crate::alerting::{NotifyOperator, ShipIncident};
use crate::compute::{ComputeClient, StatusProbe};
use crate::incident::{new_incident_id, IncidentRecord, ResourceId, VmStatus};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Fixed sleep between poll cycles. Applied unconditionally, also after
/// failures; there is deliberately no backoff.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// An alert-worthy edge observed by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: VmStatus,
    pub new: VmStatus,
}

/// Debounce state, owned by the loop for the process lifetime. A restart
/// forgets it and starts over from `running`.
#[derive(Debug, Clone)]
pub struct MonitorState {
    last_observed: VmStatus,
    down_logged: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            last_observed: VmStatus::running(),
            down_logged: false,
        }
    }

    /// Feed one observation through the transition table.
    ///
    /// Returns the edge to alert on, or `None` when nothing fires: the VM is
    /// still running, or the current outage was already logged (even if the
    /// non-running code itself changed, e.g. stopped → deallocated).
    ///
    /// Invariant: `down_logged` is true only while `last_observed` is
    /// non-running; observing `running` always resets it.
    pub fn observe(&mut self, observed: &VmStatus) -> Option<StatusChange> {
        let previous = self.last_observed.clone();

        let change = if observed.is_running() {
            self.down_logged = false;
            None
        } else if self.down_logged {
            None
        } else {
            self.down_logged = true;
            Some(StatusChange {
                previous,
                new: observed.clone(),
            })
        };

        self.last_observed = observed.clone();
        change
    }

    pub fn last_observed(&self) -> &VmStatus {
        &self.last_observed
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// The long-running heartbeat: probe, debounce, ship, notify, sleep.
pub struct MonitorLoop<C, S, N>
where
    C: ComputeClient,
    S: ShipIncident,
    N: NotifyOperator,
{
    probe: StatusProbe<C>,
    shipper: S,
    notifier: N,
    resource: ResourceId,
    state: MonitorState,
    poll_interval: Duration,
}

impl<C, S, N> MonitorLoop<C, S, N>
where
    C: ComputeClient,
    S: ShipIncident,
    N: NotifyOperator,
{
    pub fn new(probe: StatusProbe<C>, shipper: S, notifier: N, resource: ResourceId) -> Self {
        Self {
            probe,
            shipper,
            notifier,
            resource,
            state: MonitorState::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval (tests and operators only; the default
    /// cadence is part of the observable behavior).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// One poll cycle: probe, run the state machine, dispatch.
    ///
    /// Never fails — every outcome is handled here so the loop survives any
    /// single cycle going wrong. A probe failure decides no transition; the
    /// debounce state is left untouched for that cycle.
    pub async fn tick(&mut self) {
        match self.probe.probe().await {
            Err(e) => {
                let incident_id = new_incident_id();
                error!(
                    error = %e,
                    incident_id = %incident_id,
                    vm = %self.resource.vm_name,
                    "VM status probe failed"
                );
                let message = format!(
                    "The status of the VM {} could not be retrieved: {e}",
                    self.resource.vm_name
                );
                self.notifier.notify(&message, &incident_id).await;
            }
            Ok(observed) => {
                if let Some(change) = self.state.observe(&observed) {
                    self.raise_alert(change).await;
                }
            }
        }
    }

    /// Ship the incident and notify the operator, escalating on ship failure.
    async fn raise_alert(&self, change: StatusChange) {
        let incident = IncidentRecord::new(&self.resource, change.previous, change.new);

        info!(
            incident_id = %incident.id,
            vm = %self.resource.vm_name,
            previous = %incident.previous_status,
            new = %incident.new_status,
            "Power-state transition detected"
        );

        match self.shipper.ship(&incident).await {
            Ok(()) => {
                let message = format!(
                    "There is a new status for the VM {}: {}.",
                    self.resource.vm_name, incident.new_status
                );
                self.notifier.notify(&message, &incident.id).await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    incident_id = %incident.id,
                    "Log shipping failed, escalating to the notification chain"
                );
                let message = format!(
                    "The status change of the VM {} to {} could not be logged: {e}",
                    self.resource.vm_name, incident.new_status
                );
                self.notifier.notify(&message, &incident.id).await;
            }
        }
    }

    /// Run until `shutdown` resolves. The loop only stops between cycles,
    /// never mid-dispatch.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        info!(
            vm = %self.resource.vm_name,
            resource_group = %self.resource.resource_group,
            interval_secs = self.poll_interval.as_secs(),
            "Starting VM monitor loop"
        );

        tokio::pin!(shutdown);
        loop {
            self.tick().await;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping monitor loop");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::notifier::MockNotifyOperator;
    use crate::alerting::shipper::MockShipIncident;
    use crate::alerting::ShipError;
    use crate::compute::client::{
        InstanceViewStatus, MockComputeClient, VirtualMachineInstanceView,
    };

    fn status(code: &str) -> VmStatus {
        VmStatus::new(code)
    }

    fn view_with_power_state(code: &str) -> VirtualMachineInstanceView {
        VirtualMachineInstanceView {
            statuses: vec![
                InstanceViewStatus {
                    code: "ProvisioningState/succeeded".to_string(),
                },
                InstanceViewStatus {
                    code: code.to_string(),
                },
            ],
        }
    }

    fn test_resource() -> ResourceId {
        ResourceId {
            resource_group: "VMs".to_string(),
            vm_name: "app-vm-01".to_string(),
        }
    }

    #[test]
    fn should_fire_once_per_maximal_non_running_run() {
        // Arrange
        let mut state = MonitorState::new();
        let sequence = [
            "PowerState/running",
            "PowerState/stopped",
            "PowerState/stopped",
            "PowerState/deallocated",
            "PowerState/running",
            "PowerState/stopped",
        ];

        // Act
        let fired: Vec<_> = sequence
            .iter()
            .filter_map(|code| state.observe(&status(code)))
            .collect();

        // Assert - two maximal non-running runs, two alerts
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].new, status("PowerState/stopped"));
        assert_eq!(fired[0].previous, status("PowerState/running"));
        assert_eq!(fired[1].new, status("PowerState/stopped"));
        assert_eq!(fired[1].previous, status("PowerState/running"));
    }

    #[test]
    fn should_suppress_changes_between_non_running_states() {
        // Arrange
        let mut state = MonitorState::new();
        state.observe(&status("PowerState/stopped"));

        // Act - still down, only the code changed
        let change = state.observe(&status("PowerState/deallocated"));

        // Assert
        assert!(change.is_none());
    }

    #[test]
    fn should_reset_on_return_to_running() {
        // Arrange
        let mut state = MonitorState::new();
        state.observe(&status("PowerState/stopped"));

        // Act
        let reset = state.observe(&status("PowerState/running"));
        let refire = state.observe(&status("PowerState/stopped"));

        // Assert
        assert!(reset.is_none());
        assert!(refire.is_some());
    }

    #[test]
    fn should_start_from_running_without_firing() {
        // Arrange
        let mut state = MonitorState::new();

        // Act
        let change = state.observe(&status("PowerState/running"));

        // Assert
        assert!(change.is_none());
        assert!(state.last_observed().is_running());
    }

    #[tokio::test]
    async fn should_ship_and_notify_on_down_transition() {
        // Arrange
        let mut client = MockComputeClient::new();
        client
            .expect_instance_view()
            .returning(|| Ok(Some(view_with_power_state("PowerState/stopped"))));

        let mut shipper = MockShipIncident::new();
        shipper
            .expect_ship()
            .times(1)
            .withf(|incident| incident.new_status.as_str() == "PowerState/stopped")
            .returning(|_| Ok(()));

        let mut notifier = MockNotifyOperator::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|message, _| message.contains("new status"))
            .returning(|_, _| ());

        let mut monitor =
            MonitorLoop::new(StatusProbe::new(client), shipper, notifier, test_resource());

        // Act
        monitor.tick().await;
    }

    #[tokio::test]
    async fn should_escalate_to_notifier_when_shipping_fails() {
        // Arrange
        let mut client = MockComputeClient::new();
        client
            .expect_instance_view()
            .returning(|| Ok(Some(view_with_power_state("PowerState/stopped"))));

        let mut shipper = MockShipIncident::new();
        shipper.expect_ship().times(1).returning(|_| {
            Err(ShipError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            })
        });

        let mut notifier = MockNotifyOperator::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|message, _| message.contains("could not be logged"))
            .returning(|_, _| ());

        let mut monitor =
            MonitorLoop::new(StatusProbe::new(client), shipper, notifier, test_resource());

        // Act
        monitor.tick().await;
    }

    #[tokio::test]
    async fn should_notify_without_shipping_when_probe_fails() {
        // Arrange
        let mut client = MockComputeClient::new();
        client.expect_instance_view().returning(|| Ok(None));

        let mut shipper = MockShipIncident::new();
        shipper.expect_ship().never();

        let mut notifier = MockNotifyOperator::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|message, _| message.contains("could not be retrieved"))
            .returning(|_, _| ());

        let mut monitor =
            MonitorLoop::new(StatusProbe::new(client), shipper, notifier, test_resource());

        // Act
        monitor.tick().await;
    }

    #[tokio::test]
    async fn should_not_alert_while_vm_stays_running() {
        // Arrange
        let mut client = MockComputeClient::new();
        client
            .expect_instance_view()
            .returning(|| Ok(Some(view_with_power_state("PowerState/running"))));

        let mut shipper = MockShipIncident::new();
        shipper.expect_ship().never();

        let mut notifier = MockNotifyOperator::new();
        notifier.expect_notify().never();

        let mut monitor =
            MonitorLoop::new(StatusProbe::new(client), shipper, notifier, test_resource());

        // Act - several quiet cycles
        monitor.tick().await;
        monitor.tick().await;
        monitor.tick().await;
    }

    #[tokio::test]
    async fn should_leave_debounce_state_untouched_on_probe_failure() {
        // Arrange - down (alert), probe failure, then still down
        let mut client = MockComputeClient::new();
        let mut cycle = 0;
        client.expect_instance_view().returning(move || {
            cycle += 1;
            match cycle {
                1 => Ok(Some(view_with_power_state("PowerState/stopped"))),
                2 => Ok(None),
                _ => Ok(Some(view_with_power_state("PowerState/stopped"))),
            }
        });

        let mut shipper = MockShipIncident::new();
        shipper.expect_ship().times(1).returning(|_| Ok(()));

        // One alert notification plus one probe-failure notification
        let mut notifier = MockNotifyOperator::new();
        notifier.expect_notify().times(2).returning(|_, _| ());

        let mut monitor =
            MonitorLoop::new(StatusProbe::new(client), shipper, notifier, test_resource());

        // Act
        monitor.tick().await;
        monitor.tick().await;
        monitor.tick().await;
    }
}

//! Compute-provider client abstraction
//!
//! [`ComputeClient`] is the seam the status probe talks through, so tests can
//! substitute a mock. [`AzureComputeClient`] is the production implementation:
//! it authenticates a service principal against Entra ID and fetches the VM
//! with its instance view expanded, once per poll cycle.

use serde::Deserialize;
use tracing::{debug, error};

/// ARM API version for the virtual-machine GET.
const COMPUTE_API_VERSION: &str = "2024-07-01";

/// Scope requested with the client-credentials grant.
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The token endpoint refused the service-principal credentials.
    #[error("service principal authentication failed: {0}")]
    Auth(String),

    /// The HTTP request itself failed (connect, timeout, decode).
    #[error("compute request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("compute API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One entry of the instance view's ordered status collection.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceViewStatus {
    pub code: String,
}

/// The expanded instance view of a virtual machine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VirtualMachineInstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceViewStatus>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct VirtualMachineResponse {
    #[serde(default)]
    properties: VirtualMachineProperties,
}

#[derive(Debug, Default, Deserialize)]
struct VirtualMachineProperties {
    #[serde(rename = "instanceView")]
    instance_view: Option<VirtualMachineInstanceView>,
}

/// Read-only view of the monitored VM's instance state.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ComputeClient: Send + Sync {
    /// Fetch the VM's instance view, or `None` when the provider omits it.
    async fn instance_view(&self) -> Result<Option<VirtualMachineInstanceView>, ComputeError>;
}

/// Service-principal credentials for the Azure management plane.
#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// ARM REST client scoped to a single virtual machine.
#[derive(Clone)]
pub struct AzureComputeClient {
    http: reqwest::Client,
    credentials: AzureCredentials,
    subscription_id: String,
    resource_group: String,
    vm_name: String,
}

impl AzureComputeClient {
    pub fn new(
        http: reqwest::Client,
        credentials: AzureCredentials,
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        vm_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            vm_name: vm_name.into(),
        }
    }

    /// Acquire a bearer token via the client-credentials grant.
    ///
    /// Requested fresh for every instance-view fetch; at a five-minute poll
    /// cadence a cached token would expire between most cycles anyway.
    async fn acquire_token(&self) -> Result<String, ComputeError> {
        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.credentials.tenant_id
        );

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self.http.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status = status, "Token request rejected");
            return Err(ComputeError::Auth(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        debug!("Service principal token acquired");
        Ok(token.access_token)
    }

    fn vm_url(&self) -> String {
        format!(
            "https://management.azure.com/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            self.subscription_id, self.resource_group, self.vm_name
        )
    }
}

#[async_trait::async_trait]
impl ComputeClient for AzureComputeClient {
    async fn instance_view(&self) -> Result<Option<VirtualMachineInstanceView>, ComputeError> {
        let token = self.acquire_token().await?;

        let response = self
            .http
            .get(self.vm_url())
            .query(&[("$expand", "instanceView"), ("api-version", COMPUTE_API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status = status, vm = %self.vm_name, "Instance view request rejected");
            return Err(ComputeError::Rejected { status, body });
        }

        let vm: VirtualMachineResponse = response.json().await?;
        Ok(vm.properties.instance_view)
    }
}

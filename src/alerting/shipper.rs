//! Log shipping to the ingestion endpoint
//!
//! Serializes one incident into the custom-log row format and POSTs it with
//! SharedKey headers. Anything other than HTTP 200 is a [`ShipError`]; the
//! monitor loop owns the escalation that follows.

use crate::alerting::signature::{shared_key_headers, SignatureError};
use crate::incident::IncidentRecord;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

/// Host suffix of the ingestion endpoint.
const INGESTION_HOST_SUFFIX: &str = "ods.opinsights.azure.com";

/// API version pinned by the ingestion contract.
const INGESTION_API_VERSION: &str = "2016-04-01";

#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// The request never produced an HTTP answer.
    #[error("log ingestion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with something other than 200.
    #[error("log ingestion returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The SharedKey headers could not be built.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The log row could not be serialized.
    #[error("log row serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One row of the shipped custom log. Field names are part of the ingestion
/// contract and are preserved verbatim.
#[derive(Debug, Serialize)]
struct LogRow<'a> {
    #[serde(rename = "TimeGenerated")]
    time_generated: String,
    #[serde(rename = "VMName")]
    vm_name: &'a str,
    #[serde(rename = "VMStatus")]
    vm_status: &'a str,
    #[serde(rename = "LogNumber")]
    log_number: &'a str,
}

/// Seam the monitor loop ships through, mockable in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ShipIncident: Send + Sync {
    async fn ship(&self, incident: &IncidentRecord) -> Result<(), ShipError>;
}

/// Ships incident rows to the Log Analytics HTTP Data Collector API.
#[derive(Clone)]
pub struct LogShipper {
    http: reqwest::Client,
    workspace_id: String,
    workspace_key: String,
}

impl LogShipper {
    pub fn new(
        http: reqwest::Client,
        workspace_id: impl Into<String>,
        workspace_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            workspace_id: workspace_id.into(),
            workspace_key: workspace_key.into(),
        }
    }

    fn ingestion_url(&self) -> String {
        format!(
            "https://{}.{}/api/logs?api-version={}",
            self.workspace_id, INGESTION_HOST_SUFFIX, INGESTION_API_VERSION
        )
    }
}

#[async_trait::async_trait]
impl ShipIncident for LogShipper {
    async fn ship(&self, incident: &IncidentRecord) -> Result<(), ShipError> {
        let rows = [LogRow {
            time_generated: incident.timestamp.to_rfc3339(),
            vm_name: &incident.resource.vm_name,
            vm_status: incident.new_status.as_str(),
            log_number: &incident.id,
        }];
        let body = serde_json::to_string(&rows)?;

        let headers =
            shared_key_headers(&self.workspace_id, &self.workspace_key, body.as_bytes(), Utc::now())?;

        debug!(incident_id = %incident.id, "Shipping incident log row");

        let response = self
            .http
            .post(self.ingestion_url())
            .header("Content-Type", headers.content_type)
            .header("Authorization", headers.authorization.as_str())
            .header("x-ms-date", headers.x_ms_date.as_str())
            .header("Log-Type", headers.log_type)
            .body(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ShipError::Rejected { status, body });
        }

        info!(incident_id = %incident.id, "Incident log row shipped");
        Ok(())
    }
}

//! Application configuration
//!
//! Everything the monitor needs is sourced from the environment once at
//! startup. Every listed variable is required; a missing one fails fast with
//! an error naming it, instead of letting a malformed request surface the
//! problem much later.

use std::env;
use std::time::Duration;

/// Default seconds between poll cycles.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {var} is not a valid number: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Immutable runtime configuration, constructed once and handed into the
/// components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Azure subscription / service principal
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,

    // Monitored resource
    pub resource_group: String,
    pub vm_name: String,

    // Log Analytics workspace
    pub logs_workspace_id: String,
    pub logs_workspace_key: String,

    // SMTP relay
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_login: String,
    pub smtp_password: String,

    // Mail identities
    pub sender_name: String,
    pub sender_email: String,
    pub receiver_name: String,
    pub receiver_email: String,

    // Ticketing
    pub freshdesk_domain: String,
    pub freshdesk_api_key: String,
    pub freshdesk_group_id: u64,
    pub freshdesk_responder_id: u64,

    /// Seconds between poll cycles. Defaults to 300; overridable so tests
    /// and operators can shorten it.
    pub poll_interval_secs: u64,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn required_number<T: std::str::FromStr>(name: &'static str) -> Result<T, ConfigError> {
    let value = required(name)?;
    value
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var: name, value })
}

impl AppConfig {
    /// Load the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_interval_secs = match env::var("POLL_INTERVAL_SECS") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                var: "POLL_INTERVAL_SECS",
                value,
            })?,
            Err(_) => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            subscription_id: required("SUBSCRIPTION_ID")?,
            tenant_id: required("TENANT_ID")?,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,

            resource_group: required("RESOURCE_GROUP")?,
            vm_name: required("VM_NAME")?,

            logs_workspace_id: required("LOGS_WORKSPACE_ID")?,
            logs_workspace_key: required("LOGS_WORKSPACE_KEY")?,

            smtp_host: required("SMTP_SERVER")?,
            smtp_port: required_number("SMTP_PORT")?,
            smtp_login: required("SMTP_LOGIN")?,
            smtp_password: required("SMTP_PASSWORD")?,

            sender_name: required("SENDER_NAME")?,
            sender_email: required("SENDER_EMAIL")?,
            receiver_name: required("RECEIVER_NAME")?,
            receiver_email: required("RECEIVER_EMAIL")?,

            freshdesk_domain: required("FRESHDESK_DOMAIN")?,
            freshdesk_api_key: required("FRESHDESK_API_KEY")?,
            freshdesk_group_id: required_number("FRESHDESK_GROUP_ID")?,
            freshdesk_responder_id: required_number("FRESHDESK_RESPONDER_ID")?,

            poll_interval_secs,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("SUBSCRIPTION_ID", "sub-1"),
        ("TENANT_ID", "tenant-1"),
        ("CLIENT_ID", "client-1"),
        ("CLIENT_SECRET", "secret"),
        ("RESOURCE_GROUP", "VMs"),
        ("VM_NAME", "app-vm-01"),
        ("LOGS_WORKSPACE_ID", "workspace-1"),
        ("LOGS_WORKSPACE_KEY", "a2V5"),
        ("SMTP_SERVER", "smtp.example.com"),
        ("SMTP_PORT", "587"),
        ("SMTP_LOGIN", "mailer"),
        ("SMTP_PASSWORD", "mailer-pass"),
        ("SENDER_NAME", "Ops"),
        ("SENDER_EMAIL", "ops@example.com"),
        ("RECEIVER_NAME", "Acme"),
        ("RECEIVER_EMAIL", "acme@example.com"),
        ("FRESHDESK_DOMAIN", "acme"),
        ("FRESHDESK_API_KEY", "fd-key"),
        ("FRESHDESK_GROUP_ID", "7"),
        ("FRESHDESK_RESPONDER_ID", "9"),
    ];

    fn set_all_required() {
        for (name, value) in REQUIRED_VARS {
            env::set_var(name, value);
        }
    }

    // Environment mutation is process-wide, so every scenario lives in one
    // sequential test.
    #[test]
    fn should_load_from_env_and_fail_fast_on_bad_input() {
        // Arrange
        set_all_required();
        env::remove_var("POLL_INTERVAL_SECS");

        // Act - happy path with the default cadence
        let config = AppConfig::from_env().expect("all variables set");

        // Assert
        assert_eq!(config.vm_name, "app-vm-01");
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.freshdesk_group_id, 7);
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.poll_interval(), Duration::from_secs(300));

        // Act - cadence override
        env::set_var("POLL_INTERVAL_SECS", "5");
        let config = AppConfig::from_env().expect("override is a valid number");
        assert_eq!(config.poll_interval_secs, 5);
        env::remove_var("POLL_INTERVAL_SECS");

        // Act - unparsable number fails fast naming the variable
        env::set_var("SMTP_PORT", "not-a-port");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber { var: "SMTP_PORT", .. }
        ));
        env::set_var("SMTP_PORT", "587");

        // Act - missing required variable fails fast naming it
        env::remove_var("SUBSCRIPTION_ID");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("SUBSCRIPTION_ID")));
        env::set_var("SUBSCRIPTION_ID", "sub-1");
    }
}

use std::time::Duration;

use vmwatch::alerting::{EmailNotifier, LogShipper, SmtpMailer, TicketDispatcher};
use vmwatch::compute::{AzureComputeClient, AzureCredentials, StatusProbe};
use vmwatch::config::AppConfig;
use vmwatch::incident::ResourceId;
use vmwatch::monitor::MonitorLoop;
use vmwatch::{shutdown, utils};

/// Bound on every outbound HTTP request (token, instance view, ingestion).
/// The ticketing call additionally carries its own 30-second limit.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // 1. Load environment
    dotenvy::dotenv().ok();

    // 2. Initialize logging; the guard flushes the file appender on exit
    let _guard = utils::init_logging();

    // 3. Wire everything and run
    if let Err(e) = run().await {
        tracing::error!(error = %e, "vmwatch failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let compute = AzureComputeClient::new(
        http.clone(),
        AzureCredentials {
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        },
        config.subscription_id.clone(),
        config.resource_group.clone(),
        config.vm_name.clone(),
    );
    let probe = StatusProbe::new(compute);

    let shipper = LogShipper::new(
        http.clone(),
        config.logs_workspace_id.clone(),
        config.logs_workspace_key.clone(),
    );

    let mailer = SmtpMailer::new(
        &config.smtp_host,
        config.smtp_port,
        config.smtp_login.clone(),
        config.smtp_password.clone(),
        &config.sender_name,
        &config.sender_email,
    )?;

    let tickets = TicketDispatcher::new(
        http,
        config.freshdesk_domain.clone(),
        config.freshdesk_api_key.clone(),
        config.freshdesk_group_id,
        config.freshdesk_responder_id,
        config.receiver_name.clone(),
        config.receiver_email.clone(),
    );

    let notifier = EmailNotifier::new(
        mailer,
        tickets,
        config.sender_name.clone(),
        config.sender_email.clone(),
        config.receiver_name.clone(),
        config.receiver_email.clone(),
        config.resource_group.clone(),
        config.vm_name.clone(),
    );

    let resource = ResourceId {
        resource_group: config.resource_group.clone(),
        vm_name: config.vm_name.clone(),
    };

    MonitorLoop::new(probe, shipper, notifier, resource)
        .with_poll_interval(config.poll_interval())
        .run(shutdown::shutdown_signal())
        .await;

    Ok(())
}

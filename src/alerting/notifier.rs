//! Operator notification via email, with ticket fallback
//!
//! [`EmailNotifier`] renders an HTML alert and sends it through a [`Mailer`].
//! When the mail transport fails it opens a support ticket carrying the
//! failure text instead — the ticket is the last line of defense for
//! operator awareness, so `notify` itself never fails.

use crate::alerting::ticket::TicketSink;
use crate::alerting::{Channel, NotificationAttempt};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, warn};

/// Subject used for the fallback ticket, naming the channel that failed.
const EMAIL_FAILED_SUBJECT: &str = "Alert email delivery failed";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// SMTP transport-level failure (connection, STARTTLS, authentication).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The sender or recipient address could not be parsed.
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("email build error: {0}")]
    Build(String),
}

/// Seam over the mail transport, mockable in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Send one HTML message in a single authenticated session.
    async fn send_html(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
    ) -> Result<(), NotifyError>;
}

/// Production mailer over an authenticated STARTTLS SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        login: String,
        password: String,
        sender_name: &str,
        sender_email: &str,
    ) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(login, password))
            .build();

        let sender = Mailbox::new(Some(sender_name.to_string()), sender_email.parse()?);

        Ok(Self { transport, sender })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
    ) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.sender.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Seam the monitor loop notifies through, mockable in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait NotifyOperator: Send + Sync {
    /// Notify the operator about `message`. Degrades internally; never fails.
    async fn notify(&self, message: &str, incident_id: &str);
}

/// Email notifier with support-ticket fallback.
pub struct EmailNotifier<M: Mailer, T: TicketSink> {
    mailer: M,
    tickets: T,
    sender_name: String,
    support_contact: String,
    receiver_name: String,
    receiver_email: String,
    resource_group: String,
    vm_name: String,
}

impl<M: Mailer, T: TicketSink> EmailNotifier<M, T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mailer: M,
        tickets: T,
        sender_name: impl Into<String>,
        support_contact: impl Into<String>,
        receiver_name: impl Into<String>,
        receiver_email: impl Into<String>,
        resource_group: impl Into<String>,
        vm_name: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            tickets,
            sender_name: sender_name.into(),
            support_contact: support_contact.into(),
            receiver_name: receiver_name.into(),
            receiver_email: receiver_email.into(),
            resource_group: resource_group.into(),
            vm_name: vm_name.into(),
        }
    }

    /// HTML body embedding the incident reference, resource identity, and
    /// the human-facing message.
    fn render_body(&self, message: &str, incident_id: &str) -> String {
        let detail_table = format!(
            r#"<table border="0" cellpadding="5" cellspacing="0" style="border-collapse: collapse; text-align: left;">
    <tr><th>Incident Number:</th><td>{incident_id}</td></tr>
    <tr><th>VM Name:</th><td>{vm}</td></tr>
    <tr><th>Resource Group Name:</th><td>{rg}</td></tr>
    <tr><th>Comment:</th><td>{message}</td></tr>
</table>"#,
            vm = self.vm_name,
            rg = self.resource_group,
        );

        format!(
            "Dear {receiver}<br><br>\
             We are writing to you because an incident has occurred during the normal \
             operation of your VM, and we will now commence an investigation into this.<br><br>\
             ======================<br>\
             {detail_table}\
             ======================<br>\
             If you need further assistance, please contact us at {contact}.<br><br>\
             Yours sincerely<br>\
             {sender}<br><br>",
            receiver = self.receiver_name,
            contact = self.support_contact,
            sender = self.sender_name,
        )
    }
}

#[async_trait::async_trait]
impl<M: Mailer, T: TicketSink> NotifyOperator for EmailNotifier<M, T> {
    async fn notify(&self, message: &str, incident_id: &str) {
        let subject = format!("System Degradation Alert | {}", self.vm_name);
        let to = format!("{} <{}>", self.receiver_name, self.receiver_email);
        let body = self.render_body(message, incident_id);

        let attempt = match self.mailer.send_html(&to, &subject, body).await {
            Ok(()) => NotificationAttempt::success(Channel::Email),
            Err(e) => NotificationAttempt::failure(Channel::Email, e.to_string()),
        };

        match attempt.cause() {
            None => {
                info!(incident_id = %incident_id, "Operator notified by email");
            }
            Some(cause) => {
                warn!(
                    error = %cause,
                    incident_id = %incident_id,
                    "Email delivery failed, falling back to a support ticket"
                );
                let fallback = format!(
                    "Email notification delivery failed for incident {incident_id}: {cause}"
                );
                match self.tickets.open_ticket(&fallback, EMAIL_FAILED_SUBJECT).await {
                    Some(ticket_id) => {
                        info!(
                            ticket_id = ticket_id,
                            incident_id = %incident_id,
                            "Fallback support ticket opened"
                        );
                    }
                    None => {
                        error!(
                            incident_id = %incident_id,
                            "Every notification channel failed; incident is only recorded in this log"
                        );
                    }
                }
            }
        }
    }
}

//! Alerting pipeline
//!
//! Everything that happens after a transition is judged alert-worthy:
//! - SharedKey signing and log shipping to the ingestion API
//! - Operator email notification
//! - Support-ticket fallback

pub mod notifier;
pub mod shipper;
pub mod signature;
pub mod ticket;

pub use notifier::{EmailNotifier, Mailer, NotifyError, NotifyOperator, SmtpMailer};
pub use shipper::{LogShipper, ShipError, ShipIncident};
pub use signature::{shared_key_headers, SignatureError, SignedHeaders};
pub use ticket::{TicketDispatcher, TicketSink};

/// Notification channel a dispatch attempt went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Ticket,
}

/// Outcome of one dispatch attempt. Ephemeral; it only drives the fallback
/// branch and the log line, nothing is stored.
#[derive(Debug, Clone)]
pub struct NotificationAttempt {
    pub channel: Channel,
    pub cause: Option<String>,
}

impl NotificationAttempt {
    pub fn success(channel: Channel) -> Self {
        Self {
            channel,
            cause: None,
        }
    }

    pub fn failure(channel: Channel, cause: impl Into<String>) -> Self {
        Self {
            channel,
            cause: Some(cause.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.cause.is_none()
    }

    /// Failure text, when the attempt failed.
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

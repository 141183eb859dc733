//! Single-VM power-state heartbeat monitor
//!
//! Polls one cloud VM's power state on a fixed cadence. On the first
//! departure from running, ships a signed log row to the ingestion API and
//! emails the operator; when email delivery fails, a support ticket is the
//! fallback. Everything external (compute provider, SMTP relay, ticketing
//! API) sits behind a trait seam so the chain is testable end to end.

pub mod alerting;
pub mod compute;
pub mod config;
pub mod incident;
pub mod monitor;
pub mod shutdown;
pub mod utils;

//! Compute-provider integration
//!
//! - Client seam and the Azure ARM implementation
//! - Power-state probe with its positional status extraction

pub mod client;
pub mod probe;

pub use client::{AzureComputeClient, AzureCredentials, ComputeClient, ComputeError};
pub use probe::{ProbeError, StatusProbe};

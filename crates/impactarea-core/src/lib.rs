//! Impactarea Core - Domain models, configuration, and the impacted-area calculator
//!
//! This crate contains the core domain logic and port definitions for the
//! impacted area identification system.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod processing;

pub use error::{ImpactError, Result};
pub use metrics::TransferMeter;

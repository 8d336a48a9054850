//! Shared utilities for the bankdb-bootstrap binaries
//!
//! This crate provides common functionality used by the provisioning and
//! verification binaries:
//! - Structured logging initialization
//! - Environment variable parsing helpers
//! - Subprocess execution utilities
//! - Telemetry for reporting provisioning lifecycle events

pub mod command;
pub mod config;
pub mod logging;
pub mod telemetry;

pub use config::ConfigExt;
pub use logging::init_logging;
pub use telemetry::{Telemetry, TelemetryEvent};

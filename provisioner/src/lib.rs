//! Shared pieces for the bankdb provisioning binaries
//!
//! This module provides the provisioning state directory helpers and
//! re-exports the building blocks used by both binaries.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod config;
pub mod plan;
pub mod psql;
pub mod verify;

pub use common::{ConfigExt, Telemetry, TelemetryEvent};

pub const DEFAULT_STATE_DIR: &str = "/var/lib/bankdb";

/// Get the provisioning state directory from environment or default
pub fn state_dir() -> String {
    String::env_or("PROVISION_STATE_DIR", DEFAULT_STATE_DIR)
}

/// Path of the marker file written after a successful run
pub fn marker_path() -> PathBuf {
    Path::new(&state_dir()).join(".provision_complete")
}

/// Check whether a previous run left a completion marker.
///
/// The marker only warns; the statement sequence itself is unguarded and
/// the engine's duplicate-object error is the authoritative re-run signal.
pub fn marker_exists() -> bool {
    marker_path().exists()
}

/// Write the completion marker with the current timestamp
pub fn write_marker() -> Result<()> {
    let path = marker_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("Failed to create state directory")?;
    }
    std::fs::write(&path, chrono::Utc::now().to_rfc3339())
        .context("Failed to write provision marker")
}

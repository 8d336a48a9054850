//! Telemetry for provisioning lifecycle events
//!
//! Sends structured events to an optional HTTP sink. The sink is configured
//! via `PROVISION_TELEMETRY_ENDPOINT`; when unset, events are only logged
//! locally. Telemetry must never fail or delay a provisioning run.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// All telemetry events emitted by the bankdb-bootstrap binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Provisioning run started
    ProvisionStarted {
        role: String,
        database: String,
        test_database: bool,
    },

    /// Provisioning run completed successfully
    ProvisionCompleted {
        database: String,
        duration_ms: u64,
        objects_created: Vec<String>,
    },

    /// Provisioning run failed
    ProvisionFailed { phase: String, error: String },

    /// Verification run passed every check
    VerifyCompleted { database: String, checks: usize },

    /// Verification run found drift
    VerifyFailed {
        database: String,
        failures: Vec<String>,
    },

    /// Component error occurred
    ComponentError {
        component: String,
        error: String,
        context: String,
    },
}

impl TelemetryEvent {
    /// Get the event type name for logging and the sink payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProvisionStarted { .. } => "BANKDB_PROVISION_STARTED",
            Self::ProvisionCompleted { .. } => "BANKDB_PROVISION_COMPLETED",
            Self::ProvisionFailed { .. } => "BANKDB_PROVISION_FAILED",
            Self::VerifyCompleted { .. } => "BANKDB_VERIFY_COMPLETED",
            Self::VerifyFailed { .. } => "BANKDB_VERIFY_FAILED",
            Self::ComponentError { .. } => "COMPONENT_ERROR",
        }
    }

    /// Convert event to a human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::ProvisionStarted {
                role,
                database,
                test_database,
            } => {
                format!(
                    "Provisioning {} owned by {} (test_database={})",
                    database, role, test_database
                )
            }
            Self::ProvisionCompleted {
                database,
                duration_ms,
                ..
            } => {
                format!("Provisioned {} in {}ms", database, duration_ms)
            }
            Self::ProvisionFailed { phase, error } => {
                format!("Provisioning failed during {}: {}", phase, error)
            }
            Self::VerifyCompleted { database, checks } => {
                format!("{} passed all {} checks", database, checks)
            }
            Self::VerifyFailed { database, failures } => {
                format!("{} failed checks: {}", database, failures.join(", "))
            }
            Self::ComponentError {
                component,
                error,
                context,
            } => {
                format!("{} error in {}: {}", component, context, error)
            }
        }
    }
}

/// Telemetry client for sending events to the configured sink.
#[derive(Clone)]
pub struct Telemetry {
    client: Arc<Client>,
    endpoint: Option<String>,
    component: String,
}

impl Telemetry {
    /// Create a new telemetry client from environment variables.
    pub fn from_env(component: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client: Arc::new(client),
            endpoint: env::var("PROVISION_TELEMETRY_ENDPOINT").ok(),
            component: component.to_string(),
        }
    }

    fn payload(&self, event: &TelemetryEvent) -> serde_json::Value {
        json!({
            "event": event.event_type(),
            "message": event.message(),
            "component": self.component,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "detail": event,
        })
    }

    /// Send a telemetry event (fire and forget, non-blocking).
    ///
    /// This spawns a thread to send the event asynchronously.
    /// Errors are logged but do not affect the caller.
    pub fn send(&self, event: TelemetryEvent) {
        info!(event = %event.event_type(), "{}", event.message());

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };

        let client = Arc::clone(&self.client);
        let payload = self.payload(&event);

        thread::spawn(move || {
            match client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
            {
                Ok(resp) if resp.status().is_success() => {
                    // Success - no action needed
                }
                Ok(resp) => {
                    warn!("Telemetry got status {}", resp.status());
                }
                Err(e) => {
                    warn!("Telemetry send failed: {}", e);
                }
            }
        });
    }

    /// Send a telemetry event and wait for delivery.
    ///
    /// Use this for terminal events right before process exit, where a
    /// detached thread would be killed mid-send. The blocking client runs on
    /// its own thread so this is safe to call from async contexts.
    pub fn send_sync(&self, event: TelemetryEvent) {
        info!(event = %event.event_type(), "{}", event.message());

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };

        let client = Arc::clone(&self.client);
        let payload = self.payload(&event);

        let handle = thread::spawn(move || {
            match client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
            {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!("Telemetry got status {}", resp.status()),
                Err(e) => warn!("Telemetry send failed: {}", e),
            }
        });
        let _ = handle.join();
    }
}

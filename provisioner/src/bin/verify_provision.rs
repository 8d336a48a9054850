//! Verifies a provisioned environment against the expected catalog state
//!
//! Read-only: checks the role, its session defaults, the database
//! properties, the schema, the search path, and the absence of `public`.
//! Exits non-zero if any check fails.

use anyhow::Result;
use bankdb_provision::config::ProvisionConfig;
use bankdb_provision::verify::verify;
use common::{init_logging, Telemetry, TelemetryEvent};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("verify-provision");

    let telemetry = Telemetry::from_env("verify-provision");

    let config = match ProvisionConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            telemetry.send_sync(TelemetryEvent::ComponentError {
                component: "verify-provision".to_string(),
                error: e.to_string(),
                context: "load_config".to_string(),
            });
            std::process::exit(1);
        }
    };

    info!(
        host = %config.connection.host,
        database = %config.database.name,
        "Verifying provisioned environment"
    );

    let report = verify(&config).await;

    for check in &report.checks {
        if check.passed {
            info!(check = %check.name, "ok");
        } else {
            error!(check = %check.name, detail = %check.detail, "FAILED");
        }
    }

    if report.passed() {
        telemetry.send_sync(TelemetryEvent::VerifyCompleted {
            database: config.database.name.clone(),
            checks: report.checks.len(),
        });
        info!(checks = report.checks.len(), "All checks passed");
        Ok(())
    } else {
        let failures = report.failures();
        error!(failed = failures.len(), "Verification failed");
        telemetry.send_sync(TelemetryEvent::VerifyFailed {
            database: config.database.name.clone(),
            failures,
        });
        std::process::exit(1);
    }
}

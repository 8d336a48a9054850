//! One-shot provisioning of the bank application database environment
//!
//! Creates the application role with its session defaults, creates the
//! application database from its template, creates the schema inside it,
//! points the database's search path at the schema, and drops the built-in
//! `public` schema. Statements run in a fixed order with no existence
//! guards: re-running against an already provisioned server fails on the
//! first duplicate object.

use anyhow::Result;
use bankdb_provision::config::ProvisionConfig;
use bankdb_provision::plan::build_plan;
use bankdb_provision::psql::Psql;
use bankdb_provision::{marker_exists, marker_path, write_marker};
use common::{command, init_logging, Telemetry, TelemetryEvent};
use std::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("provision");

    let start = Instant::now();
    let telemetry = Telemetry::from_env("provision");

    let config = match ProvisionConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            telemetry.send_sync(TelemetryEvent::ProvisionFailed {
                phase: "load_config".to_string(),
                error: e.to_string(),
            });
            std::process::exit(1);
        }
    };

    info!(
        host = %config.connection.host,
        role = %config.role.name,
        database = %config.database.name,
        schema = %config.schema.name,
        "Provisioning starting"
    );

    telemetry.send(TelemetryEvent::ProvisionStarted {
        role: config.role.name.clone(),
        database: config.database.name.clone(),
        test_database: config.provision_test_database,
    });

    if marker_exists() {
        warn!(
            path = %marker_path().display(),
            "Completion marker already present; the server is likely provisioned and this run will fail on the first duplicate object"
        );
    }

    if let Ok(version) = command::run_checked("psql", &["--version"]).await {
        info!(%version, "psql client");
    }

    let psql = Psql::new(&config.connection);

    if let Err(e) = psql
        .wait_until_ready(
            &config.connection.maintenance_db,
            config.max_retries,
            config.retry_delay(),
        )
        .await
    {
        error!(error = %e, "PostgreSQL never became ready");
        telemetry.send_sync(TelemetryEvent::ProvisionFailed {
            phase: "wait_ready".to_string(),
            error: e.to_string(),
        });
        std::process::exit(1);
    }

    for step in build_plan(&config) {
        info!(step = step.name, database = %step.database, "Applying statement");

        if let Err(e) = psql.execute(&step.database, &step.sql).await {
            error!(
                step = step.name,
                database = %step.database,
                error = %e,
                "Statement failed; environment is left partially provisioned"
            );
            telemetry.send_sync(TelemetryEvent::ProvisionFailed {
                phase: step.phase(),
                error: e.to_string(),
            });
            std::process::exit(1);
        }
    }

    write_marker()?;

    let mut objects_created = vec![
        config.role.name.clone(),
        config.database.name.clone(),
        format!("{}.{}", config.database.name, config.schema.name),
    ];
    if config.provision_test_database {
        let test_db = config.test_database_name();
        objects_created.push(format!("{}.{}", test_db, config.schema.name));
        objects_created.push(test_db);
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    telemetry.send_sync(TelemetryEvent::ProvisionCompleted {
        database: config.database.name.clone(),
        duration_ms,
        objects_created,
    });

    info!(duration_ms, "Provisioning completed");

    Ok(())
}

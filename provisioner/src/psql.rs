//! SQL execution through the psql administrative client
//!
//! Every statement the provisioner issues goes through `psql` with
//! `ON_ERROR_STOP=1`. Failures carry the engine's stderr verbatim; nothing
//! is retried or rephrased.

use crate::config::ConnectionConfig;
use anyhow::{anyhow, Result};
use common::command;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Connection settings for psql invocations.
#[derive(Debug, Clone)]
pub struct Psql {
    host: String,
    port: String,
    superuser: String,
}

impl Psql {
    pub fn new(connection: &ConnectionConfig) -> Self {
        Self {
            host: connection.host.clone(),
            port: connection.port.to_string(),
            superuser: connection.superuser.clone(),
        }
    }

    fn base_args<'a>(&'a self, database: &'a str) -> Vec<&'a str> {
        vec![
            "-v",
            "ON_ERROR_STOP=1",
            "-h",
            &self.host,
            "-p",
            &self.port,
            "-U",
            &self.superuser,
            "-d",
            database,
        ]
    }

    /// Run a single SQL command against the given database.
    pub async fn execute(&self, database: &str, sql: &str) -> Result<String> {
        let mut args = self.base_args(database);
        args.push("-c");
        args.push(sql);

        let output = command::run("psql", &args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(anyhow!("psql failed: {}", output.stderr))
        }
    }

    /// Run a catalog query, returning tuples-only unaligned output.
    pub async fn query(&self, database: &str, sql: &str) -> Result<String> {
        let mut args = self.base_args(database);
        args.push("-tA");
        args.push("-c");
        args.push(sql);

        let output = command::run("psql", &args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(anyhow!("psql failed: {}", output.stderr))
        }
    }

    /// Poll the server until it accepts connections and answers a trivial
    /// query, or the retry budget is exhausted.
    pub async fn wait_until_ready(
        &self,
        database: &str,
        max_retries: u32,
        delay: Duration,
    ) -> Result<()> {
        for attempt in 1..=max_retries {
            match self.query(database, "SELECT 1").await {
                Ok(out) if out.trim() == "1" => {
                    info!(attempt, "PostgreSQL is ready");
                    return Ok(());
                }
                Ok(out) => {
                    debug!(attempt, output = %out, "Unexpected readiness probe output");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Readiness probe failed");
                }
            }

            warn!(attempt, max_retries, "PostgreSQL not ready yet");
            if attempt < max_retries {
                sleep(delay).await;
            }
        }

        Err(anyhow!(
            "PostgreSQL did not become ready after {} attempts",
            max_retries
        ))
    }
}

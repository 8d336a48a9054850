//! Provisioner configuration
//!
//! Defaults provision the bank application environment. An optional YAML
//! file (pointed at by `PROVISION_CONFIG`) overrides the defaults, and
//! `PROVISION_*` environment variables override the file.

use anyhow::{Context, Result};
use common::ConfigExt;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// How psql reaches the server, and what it connects as before the
/// application database exists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Admin role psql connects as. Authentication is whatever the server
    /// is set up for (peer, .pgpass, or an ambient PGPASSWORD).
    pub superuser: String,
    /// Database used for statements that run before the application
    /// database exists.
    pub maintenance_db: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            superuser: "postgres".to_string(),
            maintenance_db: "postgres".to_string(),
        }
    }
}

/// Application role and its session defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub name: String,
    pub password: String,
    pub client_encoding: String,
    pub transaction_isolation: String,
    pub timezone: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            name: "bankdbuser".to_string(),
            password: "bankdbpw".to_string(),
            client_encoding: "utf8".to_string(),
            transaction_isolation: "read committed".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Application database properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: String,
    pub template: String,
    pub encoding: String,
    pub lc_collate: String,
    pub lc_ctype: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "bank".to_string(),
            template: "template0".to_string(),
            encoding: "utf8".to_string(),
            lc_collate: "en_US.utf8".to_string(),
            lc_ctype: "en_US.utf8".to_string(),
        }
    }
}

/// Application schema properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub name: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name: "django".to_string(),
        }
    }
}

/// Full provisioner configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub connection: ConnectionConfig,
    pub role: RoleConfig,
    pub database: DatabaseConfig,
    pub schema: SchemaConfig,
    /// Also provision `test_<database>` for the application's test suite.
    pub provision_test_database: bool,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            role: RoleConfig::default(),
            database: DatabaseConfig::default(),
            schema: SchemaConfig::default(),
            provision_test_database: false,
            max_retries: 30,
            retry_delay_secs: 2,
        }
    }
}

impl ProvisionConfig {
    /// Load configuration: defaults, then the optional YAML file, then
    /// environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var("PROVISION_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .context(format!("Failed to read config file {}", path))?;
                serde_yaml::from_str(&content)
                    .context(format!("Failed to parse config file {}", path))?
            }
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.connection.host = String::env_or(
            "PROVISION_PG_HOST",
            &String::env_or("PGHOST", &self.connection.host),
        );
        self.connection.port = u16::env_parse(
            "PROVISION_PG_PORT",
            u16::env_parse("PGPORT", self.connection.port),
        );
        self.connection.superuser =
            String::env_or("PROVISION_SUPERUSER", &self.connection.superuser);
        self.connection.maintenance_db =
            String::env_or("PROVISION_MAINTENANCE_DB", &self.connection.maintenance_db);

        self.role.name = String::env_or("PROVISION_ROLE", &self.role.name);
        self.role.password = String::env_or("PROVISION_ROLE_PASSWORD", &self.role.password);
        self.database.name = String::env_or("PROVISION_DATABASE", &self.database.name);
        self.schema.name = String::env_or("PROVISION_SCHEMA", &self.schema.name);

        self.provision_test_database =
            bool::env_bool("PROVISION_TEST_DATABASE", self.provision_test_database);
        self.max_retries = u32::env_parse("PROVISION_MAX_RETRIES", self.max_retries);
        self.retry_delay_secs = u64::env_parse("PROVISION_RETRY_DELAY", self.retry_delay_secs);
    }

    /// Delay between server readiness polls
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Name of the test database, following the framework's `test_` prefix
    pub fn test_database_name(&self) -> String {
        format!("test_{}", self.database.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_bank_environment() {
        let config = ProvisionConfig::default();
        assert_eq!(config.role.name, "bankdbuser");
        assert_eq!(config.role.transaction_isolation, "read committed");
        assert_eq!(config.database.name, "bank");
        assert_eq!(config.database.template, "template0");
        assert_eq!(config.database.lc_collate, "en_US.utf8");
        assert_eq!(config.schema.name, "django");
        assert!(!config.provision_test_database);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let yaml = r#"
role:
  name: appuser
database:
  name: appdb
"#;
        let config: ProvisionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.role.name, "appuser");
        assert_eq!(config.role.password, "bankdbpw");
        assert_eq!(config.database.name, "appdb");
        assert_eq!(config.database.encoding, "utf8");
        assert_eq!(config.schema.name, "django");
        assert_eq!(config.connection.port, 5432);
    }

    #[test]
    fn full_yaml_overrides_everything() {
        let yaml = r#"
connection:
  host: db.internal
  port: 5433
  superuser: admin
  maintenance_db: template1
role:
  name: svc
  password: secret
  client_encoding: latin1
  transaction_isolation: serializable
  timezone: Europe/Madrid
database:
  name: svcdb
  template: template1
  encoding: latin1
  lc_collate: C
  lc_ctype: C
schema:
  name: app
provision_test_database: true
max_retries: 5
retry_delay_secs: 1
"#;
        let config: ProvisionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 5433);
        assert_eq!(config.role.timezone, "Europe/Madrid");
        assert_eq!(config.database.lc_collate, "C");
        assert!(config.provision_test_database);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_database_uses_framework_prefix() {
        let config = ProvisionConfig::default();
        assert_eq!(config.test_database_name(), "test_bank");
    }
}

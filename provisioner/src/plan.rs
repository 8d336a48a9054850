//! Provisioning statement plan
//!
//! Builds the ordered list of administrative statements. Order matters: the
//! role must exist before it owns the database, the database must exist
//! before anything is created inside it, and statements after the database
//! is created must run connected to it. Creation statements carry no
//! existence guards, so a second run against the same server fails on the
//! first object that already exists.

use crate::config::ProvisionConfig;

/// One administrative statement, the database it must run against, and a
/// short name used for logging and failure reporting.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: &'static str,
    pub database: String,
    pub sql: String,
}

impl Step {
    fn new(name: &'static str, database: &str, sql: String) -> Self {
        Self {
            name,
            database: database.to_string(),
            sql,
        }
    }

    /// Phase label used in failure telemetry
    pub fn phase(&self) -> String {
        format!("{} ({})", self.name, self.database)
    }
}

/// Quote a SQL identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Build the full ordered plan: role, session defaults, then the
/// application database, and optionally the test database after it.
pub fn build_plan(config: &ProvisionConfig) -> Vec<Step> {
    let role = quote_ident(&config.role.name);
    let maintenance = config.connection.maintenance_db.as_str();

    let mut steps = vec![
        Step::new(
            "create_role",
            maintenance,
            format!(
                "CREATE ROLE {} WITH LOGIN CREATEDB PASSWORD {};",
                role,
                quote_literal(&config.role.password)
            ),
        ),
        Step::new(
            "set_client_encoding",
            maintenance,
            format!(
                "ALTER ROLE {} SET client_encoding TO {};",
                role,
                quote_literal(&config.role.client_encoding)
            ),
        ),
        Step::new(
            "set_transaction_isolation",
            maintenance,
            format!(
                "ALTER ROLE {} SET default_transaction_isolation TO {};",
                role,
                quote_literal(&config.role.transaction_isolation)
            ),
        ),
        Step::new(
            "set_timezone",
            maintenance,
            format!(
                "ALTER ROLE {} SET timezone TO {};",
                role,
                quote_literal(&config.role.timezone)
            ),
        ),
    ];

    steps.extend(database_steps(config, &config.database.name));

    if config.provision_test_database {
        steps.extend(database_steps(config, &config.test_database_name()));
    }

    steps
}

/// Steps that create and configure one database: create it from the
/// template, create the schema inside it, grant on the schema, point the
/// database's search path at the schema, and drop the built-in `public`.
///
/// The create runs against the maintenance database; everything after it
/// runs connected to the new database.
pub fn database_steps(config: &ProvisionConfig, db_name: &str) -> Vec<Step> {
    let role = quote_ident(&config.role.name);
    let db_ident = quote_ident(db_name);
    let schema = quote_ident(&config.schema.name);

    vec![
        Step::new(
            "create_database",
            &config.connection.maintenance_db,
            format!(
                "CREATE DATABASE {} WITH OWNER = {} TEMPLATE = {} ENCODING = {} LC_COLLATE = {} LC_CTYPE = {};",
                db_ident,
                role,
                quote_ident(&config.database.template),
                quote_literal(&config.database.encoding),
                quote_literal(&config.database.lc_collate),
                quote_literal(&config.database.lc_ctype)
            ),
        ),
        Step::new(
            "create_schema",
            db_name,
            format!("CREATE SCHEMA {} AUTHORIZATION {};", schema, role),
        ),
        Step::new(
            "grant_schema",
            db_name,
            format!("GRANT ALL ON SCHEMA {} TO {};", schema, role),
        ),
        Step::new(
            "set_search_path",
            db_name,
            format!("ALTER DATABASE {} SET search_path TO {};", db_ident, schema),
        ),
        Step::new(
            "drop_public_schema",
            db_name,
            "DROP SCHEMA \"public\";".to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(steps: &[Step]) -> Vec<&'static str> {
        steps.iter().map(|s| s.name).collect()
    }

    #[test]
    fn plan_is_ordered_role_first() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(
            names(&steps),
            vec![
                "create_role",
                "set_client_encoding",
                "set_transaction_isolation",
                "set_timezone",
                "create_database",
                "create_schema",
                "grant_schema",
                "set_search_path",
                "drop_public_schema",
            ]
        );
    }

    #[test]
    fn connection_switches_to_new_database_after_create() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        for step in &steps[..5] {
            assert_eq!(step.database, "postgres", "step {}", step.name);
        }
        for step in &steps[5..] {
            assert_eq!(step.database, "bank", "step {}", step.name);
        }
    }

    #[test]
    fn role_statement_grants_createdb_and_login() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(
            steps[0].sql,
            "CREATE ROLE \"bankdbuser\" WITH LOGIN CREATEDB PASSWORD 'bankdbpw';"
        );
    }

    #[test]
    fn session_defaults_match_configuration() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(
            steps[1].sql,
            "ALTER ROLE \"bankdbuser\" SET client_encoding TO 'utf8';"
        );
        assert_eq!(
            steps[2].sql,
            "ALTER ROLE \"bankdbuser\" SET default_transaction_isolation TO 'read committed';"
        );
        assert_eq!(steps[3].sql, "ALTER ROLE \"bankdbuser\" SET timezone TO 'UTC';");
    }

    #[test]
    fn database_statement_carries_template_and_locale() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(
            steps[4].sql,
            "CREATE DATABASE \"bank\" WITH OWNER = \"bankdbuser\" TEMPLATE = \"template0\" \
             ENCODING = 'utf8' LC_COLLATE = 'en_US.utf8' LC_CTYPE = 'en_US.utf8';"
        );
    }

    #[test]
    fn schema_statements_target_the_new_database() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(
            steps[5].sql,
            "CREATE SCHEMA \"django\" AUTHORIZATION \"bankdbuser\";"
        );
        assert_eq!(steps[6].sql, "GRANT ALL ON SCHEMA \"django\" TO \"bankdbuser\";");
        assert_eq!(
            steps[7].sql,
            "ALTER DATABASE \"bank\" SET search_path TO \"django\";"
        );
        assert_eq!(steps[8].sql, "DROP SCHEMA \"public\";");
    }

    #[test]
    fn test_database_appends_a_second_database_pass() {
        let mut config = ProvisionConfig::default();
        config.provision_test_database = true;
        let steps = build_plan(&config);
        assert_eq!(steps.len(), 14);
        assert_eq!(steps[9].name, "create_database");
        assert_eq!(steps[9].database, "postgres");
        assert!(steps[9].sql.contains("CREATE DATABASE \"test_bank\""));
        for step in &steps[10..] {
            assert_eq!(step.database, "test_bank");
        }
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn phase_names_the_step_and_target() {
        let config = ProvisionConfig::default();
        let steps = build_plan(&config);
        assert_eq!(steps[0].phase(), "create_role (postgres)");
        assert_eq!(steps[5].phase(), "create_schema (bank)");
    }
}

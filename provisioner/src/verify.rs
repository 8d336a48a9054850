//! Post-provisioning catalog verification
//!
//! Read-only checks that the provisioned objects look the way the
//! provisioner left them: the role with its capability and session
//! defaults, the database with its encoding/locale/owner, the schema, the
//! search path, and the absence of `public`. Each check is one catalog
//! query through `psql -tA`, compared textually.

use crate::config::ProvisionConfig;
use crate::plan::quote_literal;
use crate::psql::Psql;

/// Outcome of a single catalog check.
#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    /// Query output on a completed check, error text on a failed query.
    pub detail: String,
}

/// Aggregated verification outcome.
#[derive(Debug)]
pub struct VerifyReport {
    pub checks: Vec<Check>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Run every check against the configured server. A connection failure
/// marks the affected check as failed rather than aborting the report.
pub async fn verify(config: &ProvisionConfig) -> VerifyReport {
    let psql = Psql::new(&config.connection);
    let maintenance = config.connection.maintenance_db.clone();
    let role = config.role.name.clone();
    let mut checks = Vec::new();

    checks.push(
        run_check(
            &psql,
            &maintenance,
            "role_privileges".to_string(),
            &format!(
                "SELECT rolcanlogin, rolcreatedb FROM pg_roles WHERE rolname = {}",
                quote_literal(&role)
            ),
            role_flags_ok,
        )
        .await,
    );

    let role_config = config.role.clone();
    checks.push(
        run_check(
            &psql,
            &maintenance,
            "role_session_defaults".to_string(),
            &format!(
                "SELECT unnest(setconfig) FROM pg_db_role_setting s \
                 JOIN pg_roles r ON r.oid = s.setrole \
                 WHERE r.rolname = {} AND s.setdatabase = 0",
                quote_literal(&role)
            ),
            move |out| {
                session_defaults_ok(
                    out,
                    &role_config.client_encoding,
                    &role_config.transaction_isolation,
                    &role_config.timezone,
                )
            },
        )
        .await,
    );

    database_checks(&psql, config, &config.database.name, &mut checks).await;

    if config.provision_test_database {
        database_checks(&psql, config, &config.test_database_name(), &mut checks).await;
    }

    VerifyReport { checks }
}

/// Checks for one provisioned database.
async fn database_checks(
    psql: &Psql,
    config: &ProvisionConfig,
    db_name: &str,
    checks: &mut Vec<Check>,
) {
    let maintenance = &config.connection.maintenance_db;
    let db = config.database.clone();
    let owner = config.role.name.clone();

    checks.push(
        run_check(
            psql,
            maintenance,
            format!("database_properties ({})", db_name),
            &format!(
                "SELECT pg_encoding_to_char(encoding), datcollate, datctype, \
                 pg_get_userbyid(datdba) FROM pg_database WHERE datname = {}",
                quote_literal(db_name)
            ),
            move |out| database_row_ok(out, &db.encoding, &db.lc_collate, &db.lc_ctype, &owner),
        )
        .await,
    );

    let schema_owner = config.role.name.clone();
    checks.push(
        run_check(
            psql,
            db_name,
            format!("schema_owner ({})", db_name),
            &format!(
                "SELECT pg_get_userbyid(nspowner) FROM pg_namespace WHERE nspname = {}",
                quote_literal(&config.schema.name)
            ),
            move |out| out.trim() == schema_owner,
        )
        .await,
    );

    checks.push(
        run_check(
            psql,
            db_name,
            format!("public_schema_absent ({})", db_name),
            "SELECT COUNT(*) FROM pg_namespace WHERE nspname = 'public'",
            |out| out.trim() == "0",
        )
        .await,
    );

    let schema_name = config.schema.name.clone();
    checks.push(
        run_check(
            psql,
            db_name,
            format!("search_path ({})", db_name),
            "SHOW search_path",
            move |out| out.trim() == schema_name,
        )
        .await,
    );
}

async fn run_check<F>(psql: &Psql, database: &str, name: String, sql: &str, ok: F) -> Check
where
    F: Fn(&str) -> bool,
{
    match psql.query(database, sql).await {
        Ok(out) => {
            let passed = ok(&out);
            Check {
                name,
                passed,
                detail: out,
            }
        }
        Err(e) => Check {
            name,
            passed: false,
            detail: e.to_string(),
        },
    }
}

/// A role row must report both LOGIN and CREATEDB.
fn role_flags_ok(out: &str) -> bool {
    out.trim() == "t|t"
}

/// The role's database-independent session defaults must include all three
/// configured settings. The server reports GUC names in canonical casing
/// (`TimeZone`), so the comparison is case-insensitive.
fn session_defaults_ok(out: &str, encoding: &str, isolation: &str, timezone: &str) -> bool {
    let haystack = out.to_lowercase();
    [
        format!("client_encoding={}", encoding),
        format!("default_transaction_isolation={}", isolation),
        format!("timezone={}", timezone),
    ]
    .iter()
    .all(|needle| haystack.contains(&needle.to_lowercase()))
}

/// The database row must match encoding, collation, ctype and owner.
/// `pg_encoding_to_char` reports `UTF8` for `utf8`, so the comparison is
/// case-insensitive.
fn database_row_ok(
    out: &str,
    encoding: &str,
    lc_collate: &str,
    lc_ctype: &str,
    owner: &str,
) -> bool {
    let expected = format!("{}|{}|{}|{}", encoding, lc_collate, lc_ctype, owner);
    out.trim().to_lowercase() == expected.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_flags_require_both_capabilities() {
        assert!(role_flags_ok("t|t"));
        assert!(role_flags_ok("t|t\n"));
        assert!(!role_flags_ok("t|f"));
        assert!(!role_flags_ok(""));
    }

    #[test]
    fn session_defaults_accept_canonical_guc_casing() {
        let out = "client_encoding=utf8\ndefault_transaction_isolation=read committed\nTimeZone=UTC";
        assert!(session_defaults_ok(out, "utf8", "read committed", "UTC"));
    }

    #[test]
    fn session_defaults_require_all_three_settings() {
        let out = "client_encoding=utf8\nTimeZone=UTC";
        assert!(!session_defaults_ok(out, "utf8", "read committed", "UTC"));
    }

    #[test]
    fn database_row_accepts_server_reported_encoding_casing() {
        let out = "UTF8|en_US.utf8|en_US.utf8|bankdbuser";
        assert!(database_row_ok(out, "utf8", "en_US.utf8", "en_US.utf8", "bankdbuser"));
    }

    #[test]
    fn database_row_rejects_wrong_owner_or_missing_database() {
        let out = "UTF8|en_US.utf8|en_US.utf8|postgres";
        assert!(!database_row_ok(out, "utf8", "en_US.utf8", "en_US.utf8", "bankdbuser"));
        assert!(!database_row_ok("", "utf8", "en_US.utf8", "en_US.utf8", "bankdbuser"));
    }

    #[test]
    fn report_aggregates_failures_by_name() {
        let report = VerifyReport {
            checks: vec![
                Check {
                    name: "a".to_string(),
                    passed: true,
                    detail: String::new(),
                },
                Check {
                    name: "b".to_string(),
                    passed: false,
                    detail: String::new(),
                },
            ],
        };
        assert!(!report.passed());
        assert_eq!(report.failures(), vec!["b".to_string()]);
    }
}

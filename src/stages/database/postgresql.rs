//! PostgreSQL dumps via `pg_dump` in custom format.
//!
//! ```yaml
//! type: postgresql
//! host: localhost
//! port: 5432
//! database: shop
//! username: backup
//! password:
//! ```

use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;

use super::{DumpTarget, decode};
use crate::config::{SubConfig, de_lenient_string};
use crate::error::{BackrError, Result};
use crate::helper::{CommandSpec, mkdir_p};
use crate::stages::{Stage, StageInput, StageOutcome};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct PostgreSqlOptions {
    host: String,
    #[serde(deserialize_with = "de_lenient_string")]
    port: String,
    database: String,
    username: String,
    #[serde(deserialize_with = "de_lenient_string")]
    password: String,
}

impl Default for PostgreSqlOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "5432".to_string(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgreSql {
    target: DumpTarget,
    options: PostgreSqlOptions,
}

impl PostgreSql {
    pub fn from_config(model: &str, target: DumpTarget, sub: &SubConfig) -> Result<Self> {
        let options: PostgreSqlOptions = decode(model, &target, sub)?;
        if options.database.trim().is_empty() {
            return Err(BackrError::config(
                model,
                format!("databases.{}.database", target.name),
                "postgresql database is required",
            ));
        }
        Ok(Self { target, options })
    }

    fn command(&self, dump_file: &str) -> CommandSpec {
        let opts = &self.options;
        let mut cmd = CommandSpec::new("pg_dump");
        if !opts.host.is_empty() {
            cmd = cmd.arg(format!("--host={}", opts.host));
        }
        if !opts.port.is_empty() {
            cmd = cmd.arg(format!("--port={}", opts.port));
        }
        if !opts.username.is_empty() {
            cmd = cmd.arg(format!("--username={}", opts.username));
        }
        cmd = cmd.args(["-Fc", "--compress=0"]).arg(opts.database.clone()).args(["-f", dump_file]);
        if !opts.password.is_empty() {
            cmd = cmd.env("PGPASSWORD", opts.password.clone());
        }
        cmd
    }
}

#[async_trait]
impl Stage for PostgreSql {
    fn name(&self) -> &str {
        &self.target.name
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let dump_dir = self.target.dump_dir(input.model);
        mkdir_p(&dump_dir).await?;
        let dump_file = dump_dir.join(format!("{}.dump", self.options.database));

        info!(
            "model={} database={} type=postgresql host={} port={} dumping {}",
            input.model.name, self.target.name, self.options.host, self.options.port, self.options.database
        );

        if let Err(e) = self.command(&dump_file.to_string_lossy()).run().await {
            error!(
                "model={} database={} type=postgresql dump failed: {}",
                input.model.name, self.target.name, e
            );
            return Err(BackrError::Execution(format!("pg_dump {}: {}", self.options.database, e)));
        }

        info!(
            "model={} database={} type=postgresql dump completed path={}",
            input.model.name,
            self.target.name,
            dump_file.display()
        );
        Ok(StageOutcome::produced(dump_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::database::DatabaseKind;

    fn target() -> DumpTarget {
        DumpTarget {
            kind: DatabaseKind::PostgreSql,
            name: "pg".to_string(),
        }
    }

    #[test]
    fn test_requires_database() {
        assert!(PostgreSql::from_config("shop", target(), &SubConfig::new("postgresql")).is_err());
    }

    #[test]
    fn test_command_keeps_password_in_env() {
        let sub = SubConfig::new("postgresql")
            .with("database", "shop")
            .with("username", "backup")
            .with("password", "s3cret");
        let stage = PostgreSql::from_config("shop", target(), &sub).unwrap();
        let cmd = stage.command("/tmp/shop.dump");

        assert_eq!(cmd.program, "pg_dump");
        assert_eq!(
            cmd.args,
            vec![
                "--host=localhost",
                "--port=5432",
                "--username=backup",
                "-Fc",
                "--compress=0",
                "shop",
                "-f",
                "/tmp/shop.dump",
            ]
        );
        assert!(!cmd.display().contains("s3cret"));
        assert_eq!(cmd.env, vec![("PGPASSWORD".to_string(), "s3cret".to_string())]);
    }
}

//! MySQL dumps via `mysqldump`.
//!
//! ```yaml
//! type: mysql
//! host: 127.0.0.1
//! port: 3306
//! database: shop
//! username: root
//! password:
//! additional_options: --single-transaction --quick
//! ```

use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use super::{DumpTarget, decode};
use crate::config::{SubConfig, de_lenient_string};
use crate::error::{BackrError, Result};
use crate::helper::{CommandSpec, mkdir_p};
use crate::stages::{Stage, StageInput, StageOutcome};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct MySqlOptions {
    host: String,
    #[serde(deserialize_with = "de_lenient_string")]
    port: String,
    database: String,
    username: String,
    #[serde(deserialize_with = "de_lenient_string")]
    password: String,
    additional_options: String,
}

impl Default for MySqlOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: "3306".to_string(),
            database: String::new(),
            username: "root".to_string(),
            password: String::new(),
            additional_options: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MySql {
    target: DumpTarget,
    options: MySqlOptions,
}

impl MySql {
    pub fn from_config(model: &str, target: DumpTarget, sub: &SubConfig) -> Result<Self> {
        let options: MySqlOptions = decode(model, &target, sub)?;
        if options.database.trim().is_empty() {
            return Err(BackrError::config(
                model,
                format!("databases.{}.database", target.name),
                "mysql database is required",
            ));
        }
        Ok(Self { target, options })
    }

    fn dump_args(&self, dump_file: &str) -> Vec<String> {
        let opts = &self.options;
        let mut args = Vec::new();
        if !opts.host.is_empty() {
            args.extend(["--host".to_string(), opts.host.clone()]);
        }
        if !opts.port.is_empty() {
            args.extend(["--port".to_string(), opts.port.clone()]);
        }
        if !opts.username.is_empty() {
            args.extend(["-u".to_string(), opts.username.clone()]);
        }
        if !opts.password.is_empty() {
            args.push(format!("-p{}", opts.password));
        }
        args.extend(opts.additional_options.split_whitespace().map(str::to_string));
        args.push(opts.database.clone());
        args.push(format!("--result-file={}", dump_file));
        args
    }
}

#[async_trait]
impl Stage for MySql {
    fn name(&self) -> &str {
        &self.target.name
    }

    async fn perform(&self, input: StageInput<'_>) -> Result<StageOutcome> {
        let dump_dir = self.target.dump_dir(input.model);
        mkdir_p(&dump_dir).await?;
        let dump_file = dump_dir.join(format!("{}.sql", self.options.database));

        info!(
            "model={} database={} type=mysql host={} port={} dumping {}",
            input.model.name, self.target.name, self.options.host, self.options.port, self.options.database
        );

        CommandSpec::new("mysqldump")
            .args(self.dump_args(&dump_file.to_string_lossy()))
            .run()
            .await
            .map_err(|e| BackrError::Execution(format!("mysqldump {}: {}", self.options.database, e)))?;

        info!(
            "model={} database={} type=mysql dump completed path={}",
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
            kind: DatabaseKind::MySql,
            name: "main".to_string(),
        }
    }

    #[test]
    fn test_requires_database() {
        let err = MySql::from_config("shop", target(), &SubConfig::new("mysql")).unwrap_err();
        assert!(err.to_string().contains("databases.main.database"));
    }

    #[test]
    fn test_defaults() {
        let sub = SubConfig::new("mysql").with("database", "shop");
        let stage = MySql::from_config("shop", target(), &sub).unwrap();
        assert_eq!(stage.options.host, "127.0.0.1");
        assert_eq!(stage.options.port, "3306");
        assert_eq!(stage.options.username, "root");
    }

    #[test]
    fn test_dump_args() {
        let sub = SubConfig::new("mysql")
            .with("database", "shop")
            .with("host", "db.internal")
            .with("port", 3307)
            .with("password", "s3cret")
            .with("additional_options", "--single-transaction  --quick");
        let stage = MySql::from_config("shop", target(), &sub).unwrap();
        let args = stage.dump_args("/tmp/shop.sql");
        assert_eq!(
            args,
            vec![
                "--host",
                "db.internal",
                "--port",
                "3307",
                "-u",
                "root",
                "-ps3cret",
                "--single-transaction",
                "--quick",
                "shop",
                "--result-file=/tmp/shop.sql",
            ]
        );
    }
}

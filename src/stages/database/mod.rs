//! Database dump stages.
//!
//! Each configured database dumps into `<dump_path>/<type>/<name>/`.

mod mysql;
mod postgresql;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{ModelSpec, SubConfig};
use crate::error::{BackrError, Result};

pub use mysql::MySql;
pub use postgresql::PostgreSql;

use super::Stage;

/// Supported `databases.<name>.type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    MySql,
    PostgreSql,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::MySql => "mysql",
            DatabaseKind::PostgreSql => "postgresql",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(DatabaseKind::MySql),
            "postgresql" | "postgres" => Ok(DatabaseKind::PostgreSql),
            other => Err(format!("unknown database type `{}`", other)),
        }
    }
}

/// Identity shared by every dump stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub kind: DatabaseKind,
    /// Key under `databases:`
    pub name: String,
}

impl DumpTarget {
    /// Directory this database dumps into for the given run.
    pub fn dump_dir(&self, spec: &ModelSpec) -> PathBuf {
        spec.dump_path.join(self.kind.as_str()).join(&self.name)
    }
}

/// Build the dump stage for `databases.<name>`.
pub fn build(model: &str, name: &str, sub: &SubConfig) -> Result<Box<dyn Stage>> {
    let field = format!("databases.{}", name);
    let kind = sub
        .kind
        .parse::<DatabaseKind>()
        .map_err(|e: String| BackrError::config(model, format!("{}.type", field), e))?;
    let target = DumpTarget {
        kind,
        name: name.to_string(),
    };

    let stage: Box<dyn Stage> = match kind {
        DatabaseKind::MySql => Box::new(MySql::from_config(model, target, sub)?),
        DatabaseKind::PostgreSql => Box::new(PostgreSql::from_config(model, target, sub)?),
    };
    Ok(stage)
}

fn decode<T: serde::de::DeserializeOwned>(model: &str, target: &DumpTarget, sub: &SubConfig) -> Result<T> {
    sub.options()
        .map_err(|e| BackrError::config(model, format!("databases.{}", target.name), e.to_string()))
}

//! Per-model configuration as written in `backr.yml`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// One backup model: what to dump, how to package it, where to store it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Command run before the dump; failures are logged only.
    pub before_script: Option<String>,

    /// Command run during finalize, whatever the outcome.
    pub after_script: Option<String>,

    /// Data sources keyed by a user chosen name.
    pub databases: BTreeMap<String, SubConfig>,

    /// Optional file archive section.
    pub archive: Option<ArchiveConfig>,

    pub compress_with: SubConfig,

    /// Empty `type` means no encryption.
    pub encrypt_with: SubConfig,

    pub store_with: SubConfig,

    /// Notifiers keyed by name.
    pub notifiers: BTreeMap<String, SubConfig>,
}

/// Paths to pack into `archive.tar` next to the dumps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// A pluggable stage section: a `type` tag plus stage-specific options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubConfig {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl SubConfig {
    /// Create a section with the given type tag and no options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: BTreeMap::new(),
        }
    }

    /// Add an option (mainly for tests and programmatic configs).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Whether a type tag was given at all.
    pub fn is_configured(&self) -> bool {
        !self.kind.trim().is_empty()
    }

    /// Decode the options into the stage's own typed settings.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        let mapping: serde_yaml::Mapping = self
            .options
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
            .collect();
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
    }
}

/// Accept `password: 123456` as well as `password: "123456"`.
pub fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found {:?}",
                other
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct DemoOptions {
        host: String,
        port: u16,
        #[serde(deserialize_with = "de_lenient_string")]
        password: String,
    }

    impl Default for DemoOptions {
        fn default() -> Self {
            Self {
                host: "localhost".to_string(),
                port: 5432,
                password: String::new(),
            }
        }
    }

    #[test]
    fn test_sub_config_parses_type_and_options() {
        let yaml = "type: postgresql\nhost: db.internal\nport: 6432\n";
        let sub: SubConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sub.kind, "postgresql");
        assert_eq!(sub.options.len(), 2);
        assert!(sub.is_configured());
    }

    #[test]
    fn test_sub_config_typed_options_with_defaults() {
        let sub = SubConfig::new("postgresql").with("host", "db.internal");
        let opts: DemoOptions = sub.options().unwrap();
        assert_eq!(opts.host, "db.internal");
        assert_eq!(opts.port, 5432);
    }

    #[test]
    fn test_lenient_string_accepts_numbers() {
        let sub = SubConfig::new("mysql").with("password", 123456);
        let opts: DemoOptions = sub.options().unwrap();
        assert_eq!(opts.password, "123456");
    }

    #[test]
    fn test_sub_config_bad_option_type() {
        let sub = SubConfig::new("mysql").with("port", "not-a-port");
        assert!(sub.options::<DemoOptions>().is_err());
    }

    #[test]
    fn test_unconfigured_sub_config() {
        let sub = SubConfig::default();
        assert!(!sub.is_configured());
        assert!(!SubConfig::new("  ").is_configured());
    }

    #[test]
    fn test_model_config_full() {
        let yaml = r#"
before_script: /opt/pre.sh
databases:
  main:
    type: mysql
    database: shop
archive:
  includes: [/etc/nginx]
  excludes: [/etc/nginx/cache]
compress_with:
  type: tgz
store_with:
  type: local
  path: /data/backups
  keep: 5
notifiers:
  ops:
    type: webhook
    url: http://hooks.local/backup
"#;
        let model: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(model.before_script.as_deref(), Some("/opt/pre.sh"));
        assert_eq!(model.databases["main"].kind, "mysql");
        assert_eq!(model.archive.as_ref().unwrap().includes, vec!["/etc/nginx"]);
        assert!(!model.encrypt_with.is_configured());
        assert_eq!(model.notifiers["ops"].kind, "webhook");
    }
}

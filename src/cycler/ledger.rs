//! On-disk retention ledger: one JSON array per model, oldest first.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BackrError, Result};

/// One uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub file_key: String,
    pub created_at: DateTime<Utc>,
}

impl Package {
    pub fn new(file_key: impl Into<String>) -> Self {
        Self {
            file_key: file_key.into(),
            created_at: Utc::now(),
        }
    }
}

/// Packages in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageList(Vec<Package>);

impl PackageList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, package: Package) {
        self.0.push(package);
    }

    /// Remove and return the oldest package.
    pub fn pop_oldest(&mut self) -> Option<Package> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.0.iter()
    }

    pub fn contains(&self, file_key: &str) -> bool {
        self.0.iter().any(|p| p.file_key == file_key)
    }

    pub fn file_keys(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.file_key.as_str()).collect()
    }
}

impl From<Vec<Package>> for PackageList {
    fn from(packages: Vec<Package>) -> Self {
        Self(packages)
    }
}

/// Location of a model's ledger file.
pub fn ledger_path(dir: &Path, model: &str) -> PathBuf {
    dir.join(format!("{}.json", model))
}

/// Read a ledger. A missing or blank file is an empty list.
pub async fn load(path: &Path) -> Result<PackageList> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PackageList::default()),
        Err(e) => {
            return Err(BackrError::Persistence(format!("read {}: {}", path.display(), e)));
        }
    };

    if content.trim().is_empty() {
        return Ok(PackageList::default());
    }

    serde_json::from_str(&content).map_err(|e| BackrError::Persistence(format!("parse {}: {}", path.display(), e)))
}

/// Overwrite a ledger through a sibling temp file and rename.
pub async fn save(path: &Path, packages: &PackageList) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackrError::Persistence(format!("create {}: {}", parent.display(), e)))?;
    }

    let body = serde_json::to_vec_pretty(packages)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| BackrError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BackrError::Persistence(format!("rename {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_absent_and_blank_are_empty() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(dir.path(), "shop");
        assert!(load(&path).await.unwrap().is_empty());

        std::fs::write(&path, "  \n").unwrap();
        assert!(load(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(dir.path(), "shop");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path).await, Err(BackrError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir.path().join("nested"), "shop");
        let list: PackageList = vec![Package::new("a.tar.zst"), Package::new("b.tar.zst")].into();

        save(&path, &list).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.file_keys(), vec!["a.tar.zst", "b.tar.zst"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"[{"file_key":"x.tar.gz","created_at":"2024-03-01T10:00:00Z"}]"#;
        let list: PackageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.file_keys(), vec!["x.tar.gz"]);
        assert_eq!(list.iter().next().unwrap().created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_pop_oldest() {
        let mut list: PackageList = vec![Package::new("a"), Package::new("b")].into();
        assert_eq!(list.pop_oldest().unwrap().file_key, "a");
        assert_eq!(list.file_keys(), vec!["b"]);
        list.pop_oldest();
        assert!(list.pop_oldest().is_none());
    }
}

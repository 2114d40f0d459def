//! Per-run scratch directory.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::helper::mkdir_p;

/// Owns a run's temp directory.
///
/// [`TempWorkspace::remove`] is the normal way out. If the guard is dropped
/// before that (the run future was cancelled) the directory is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct TempWorkspace {
    root: PathBuf,
    removed: bool,
}

impl TempWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            removed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `dir` (normally the dump path) and every parent up to the root.
    pub async fn create(&self, dir: &Path) -> std::io::Result<()> {
        mkdir_p(dir).await
    }

    /// Remove the whole tree. A directory that never existed is fine.
    pub async fn remove(&mut self) -> std::io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        debug!("workspace dropped before cleanup, removing {}", self.root.display());
        match std::fs::remove_dir_all(&self.root) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!("workspace cleanup failed path={}: {}", self.root.display(), e);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_remove() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("run-1");
        let mut workspace = TempWorkspace::new(&root);

        workspace.create(&root.join("shop")).await.unwrap();
        assert!(root.join("shop").is_dir());

        workspace.remove().await.unwrap();
        assert!(!root.exists());
        // second removal is a no-op
        workspace.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("run-2");
        {
            let workspace = TempWorkspace::new(&root);
            workspace.create(&root).await.unwrap();
            std::fs::write(root.join("partial.sql"), "--").unwrap();
        }
        assert!(!root.exists());
    }

    #[test]
    fn test_drop_without_directory_is_quiet() {
        let dir = TempDir::new().unwrap();
        drop(TempWorkspace::new(dir.path().join("never-created")));
    }
}

//! Path helpers shared by stages and configuration.

use std::path::{Component, Path, PathBuf};

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Lexically normalize a path: drop `.` segments and trailing slashes,
/// fold `..` into its parent where possible. The filesystem is not touched.
pub fn clean_path(path: impl AsRef<Path>) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Create a directory and its parents; an existing directory is fine.
pub async fn mkdir_p(dir: impl AsRef<Path>) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/backups");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("backups"));
        }
        assert_eq!(expand_home("/var/backups"), PathBuf::from("/var/backups"));
        assert_eq!(expand_home("~"), PathBuf::from("~"));
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/etc/nginx/"), PathBuf::from("/etc/nginx"));
        assert_eq!(clean_path("/etc/./nginx"), PathBuf::from("/etc/nginx"));
        assert_eq!(clean_path("/etc/nginx/../ssl"), PathBuf::from("/etc/ssl"));
        assert_eq!(clean_path("/../etc"), PathBuf::from("/etc"));
        assert_eq!(clean_path("../data"), PathBuf::from("../data"));
        assert_eq!(clean_path("./"), PathBuf::from("."));
    }

    #[tokio::test]
    async fn test_mkdir_p_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        mkdir_p(&nested).await.unwrap();
        mkdir_p(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}

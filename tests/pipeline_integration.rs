//! End-to-end runs through the built-in stages.
//!
//! Uses `tar` from PATH and local storage only.

use std::path::Path;
use std::sync::Arc;

use backr::config::{ArchiveConfig, Environment, ModelConfig, ModelSpec, SubConfig};
use backr::coordinator::{Coordinator, RunResult};
use backr::cycler::Cycler;
use backr::stages::BuiltinRegistry;
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    env: Environment,
    source: std::path::PathBuf,
    store: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("site");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("index.html"), "<h1>hi</h1>").unwrap();
        let env = Environment::new(root.path().join("tmp"), root.path().join("ledger"));
        let store = root.path().join("store");
        Self {
            env,
            source,
            store,
            _root: root,
        }
    }

    fn model(&self, keep: u32) -> ModelConfig {
        ModelConfig {
            archive: Some(ArchiveConfig {
                includes: vec![self.source.to_string_lossy().into_owned()],
                excludes: vec![],
            }),
            compress_with: SubConfig::new("tgz"),
            store_with: SubConfig::new("local")
                .with("path", self.store.to_string_lossy().into_owned())
                .with("keep", keep),
            ..Default::default()
        }
    }

    fn coordinator(&self) -> (Coordinator, Arc<Cycler>) {
        let cycler = Arc::new(Cycler::new(&self.env.ledger_dir));
        let registry = BuiltinRegistry::new(cycler.clone());
        (Coordinator::new(Arc::new(registry)), cycler)
    }
}

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_archive_compress_store() {
    let fixture = Fixture::new();
    let (coordinator, cycler) = fixture.coordinator();
    let spec = ModelSpec::new("site", fixture.model(0), &fixture.env);

    let result = coordinator.perform(&spec).await;

    assert_eq!(result, RunResult::Success);
    let stored = stored_files(&fixture.store);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with(".tar.gz"));
    assert_eq!(cycler.packages("site").await.unwrap().file_keys(), vec![stored[0].as_str()]);
    assert!(!spec.temp_path.exists());
}

#[tokio::test]
async fn test_missing_store_type_fails_and_cleans_up() {
    let fixture = Fixture::new();
    let (coordinator, cycler) = fixture.coordinator();
    let config = ModelConfig {
        store_with: SubConfig::default(),
        ..fixture.model(0)
    };
    let spec = ModelSpec::new("site", config, &fixture.env);

    let result = coordinator.perform(&spec).await;

    assert!(matches!(result, RunResult::Failed(ref r) if r.contains("store_with.type")));
    assert!(!spec.temp_path.exists());
    assert!(!fixture.store.exists());
    assert!(cycler.packages("site").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_dump_stores_nothing() {
    let fixture = Fixture::new();
    let (coordinator, _) = fixture.coordinator();
    let mut config = fixture.model(0);
    // nothing listens on port 1, so the dump fails or the tool is missing
    config.databases.insert(
        "main".to_string(),
        SubConfig::new("postgresql")
            .with("database", "shop")
            .with("host", "127.0.0.1")
            .with("port", 1),
    );
    let spec = ModelSpec::new("site", config, &fixture.env);

    let result = coordinator.perform(&spec).await;

    assert!(!result.is_success());
    assert!(!fixture.store.exists());
    assert!(!spec.temp_path.exists());
}

#[tokio::test]
async fn test_back_to_back_runs_keep_latest_backup() {
    let fixture = Fixture::new();
    let (coordinator, cycler) = fixture.coordinator();

    for _ in 0..2 {
        let spec = ModelSpec::new("site", fixture.model(1), &fixture.env);
        assert_eq!(coordinator.perform(&spec).await, RunResult::Success);
    }

    let ledger = cycler.packages("site").await.unwrap();
    let kept = ledger.file_keys();
    assert_eq!(kept.len(), 1);
    assert_eq!(stored_files(&fixture.store), vec![kept[0].to_string()]);
}

async fn perform_good_and_bad(parallel: bool) {
    let fixture = Fixture::new();
    let (coordinator, cycler) = fixture.coordinator();
    let bad = ModelConfig {
        store_with: SubConfig::new("ftp").with("path", "/srv/backups"),
        ..fixture.model(0)
    };
    let specs = vec![
        ModelSpec::new("broken", bad, &fixture.env),
        ModelSpec::new("site", fixture.model(0), &fixture.env),
    ];

    let results = coordinator.perform_all(&specs, parallel).await;

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], RunResult::Failed(ref r) if r.contains("store_with.type")));
    assert_eq!(results[1], RunResult::Success);
    assert_eq!(results.iter().filter(|r| !r.is_success()).count(), 1);

    let stored = stored_files(&fixture.store);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].starts_with("site."));
    assert!(cycler.packages("broken").await.unwrap().is_empty());
    for spec in &specs {
        assert!(!spec.temp_path.exists());
    }
}

#[tokio::test]
async fn test_bad_model_does_not_stop_others_sequential() {
    perform_good_and_bad(false).await;
}

#[tokio::test]
async fn test_bad_model_does_not_stop_others_parallel() {
    perform_good_and_bad(true).await;
}

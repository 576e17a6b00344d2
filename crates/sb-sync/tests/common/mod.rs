//! Shared harness for pipeline integration tests.
//!
//! A [`Library`] owns a temporary photo root and a file-backed catalogue,
//! and runs syncs against them with a [`FakeReader`] instead of exiftool.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sb_core::config::{Config, RootConfig};
use sb_core::metadata::{MetaValue, Metadata, MetadataType, MetadataValue, HEIGHT, TAGS, WIDTH};
use sb_core::Result;
use sb_db::models::ImageRecord;
use sb_db::pool::{init_pool, DbPool};
use sb_db::queries::images;
use sb_metadata::MetadataReader;
use sb_sync::{run_sync, SyncOptions, SyncReport};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const ROOT: &str = "photos";

/// Metadata reader returning fixed dimensions and per-file tags.
#[derive(Default)]
pub struct FakeReader {
    tags: Mutex<HashMap<String, Vec<String>>>,
    calls: AtomicUsize,
}

impl FakeReader {
    pub fn tag(&self, filename: &str, tags: &[&str]) {
        self.tags.lock().unwrap().insert(
            filename.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataReader for FakeReader {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, paths: &[PathBuf]) -> Result<Metadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let filename = paths[0]
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut md = Metadata::new();
        for (alias, v) in [(WIDTH, 4000), (HEIGHT, 3000)] {
            md.insert(MetadataValue {
                alias: alias.into(),
                source: "fake:size".into(),
                kind: MetadataType::Int,
                value: MetaValue::Int(v),
                unit: None,
            });
        }
        if let Some(tags) = self.tags.lock().unwrap().get(&filename) {
            md.insert(MetadataValue {
                alias: TAGS.into(),
                source: "fake:tags".into(),
                kind: MetadataType::List,
                value: MetaValue::List(tags.clone()),
                unit: None,
            });
        }
        Ok(md)
    }
}

pub struct Library {
    pub dir: TempDir,
    pub pool: DbPool,
    pub config: Config,
    pub reader: Arc<FakeReader>,
}

impl Library {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(ROOT)).unwrap();
        let pool = init_pool(dir.path().join("catalogue.db")).unwrap();

        let mut config = Config::default();
        config.filesystem.roots.insert(
            ROOT.into(),
            RootConfig {
                root: dir.path().join(ROOT),
                excluded: Vec::new(),
            },
        );

        Self {
            dir,
            pool,
            config,
            reader: Arc::new(FakeReader::default()),
        }
    }

    pub fn root_dir(&self) -> PathBuf {
        self.dir.path().join(ROOT)
    }

    /// Write a file below the root, creating directories as needed.
    pub fn write(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.root_dir().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root_dir().join(rel)).unwrap();
    }

    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport> {
        run_sync(
            &self.config,
            &self.pool,
            self.reader.clone(),
            options,
            CancellationToken::new(),
        )
        .await
    }

    pub async fn sync_incremental(&self) -> SyncReport {
        self.sync(SyncOptions::default()).await.unwrap()
    }

    pub async fn sync_full(&self) -> SyncReport {
        self.sync(SyncOptions {
            cleanup: true,
            force: false,
        })
        .await
        .unwrap()
    }

    pub fn record(&self, rel: &str) -> Option<ImageRecord> {
        let (path, filename) = match rel.rsplit_once('/') {
            Some((path, filename)) => (path, filename),
            None => ("", rel),
        };
        let conn = self.pool.get().unwrap();
        images::get_image_by_location(&conn, ROOT, path, filename).unwrap()
    }

    pub fn count(&self) -> i64 {
        let conn = self.pool.get().unwrap();
        images::count_images(&conn).unwrap()
    }
}

/// Shift a file's modification time without touching its content.
pub fn shift_mtime(path: &Path, secs: i64) {
    let modified = fs::metadata(path).unwrap().modified().unwrap();
    let shifted = if secs >= 0 {
        modified + std::time::Duration::from_secs(secs as u64)
    } else {
        modified - std::time::Duration::from_secs(secs.unsigned_abs())
    };
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(shifted).unwrap();
}

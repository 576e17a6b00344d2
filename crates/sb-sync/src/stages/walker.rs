//! Walks the configured roots and emits one work item per eligible file.
//!
//! Runs on a blocking thread: directory traversal and hashing are plain
//! synchronous I/O, and items are handed to the async side with
//! `blocking_send`.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sb_core::{Error, Result};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::item::{FileFacts, WorkItem};
use crate::report::SyncStats;

const STAGE: &str = "walker";

/// Extension of metadata sidecars, appended to the full file name.
pub const SIDECAR_EXT: &str = "xmp";

/// One root to walk.
#[derive(Debug, Clone)]
pub struct WalkRoot {
    pub name: String,
    pub dir: PathBuf,
    /// Absolute paths that are skipped together with everything below them.
    pub excluded: Vec<PathBuf>,
}

impl WalkRoot {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, excluded: &[String]) -> Self {
        let dir = dir.into();
        let excluded = excluded
            .iter()
            .map(|rel| dir.join(rel.trim_matches('/')))
            .collect();
        Self {
            name: name.into(),
            dir,
            excluded,
        }
    }
}

/// Start walking on a blocking thread, sending items into `tx`.
pub fn spawn_walker(
    roots: Vec<WalkRoot>,
    extensions: HashSet<String>,
    tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
    stats: Arc<SyncStats>,
) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || {
        let result = walk(&roots, &extensions, &tx, &cancel, &stats);
        if let Err(e) = &result {
            tracing::error!(stage = STAGE, error = %e, "walk failed");
            cancel.cancel();
        }
        result
    })
}

fn walk(
    roots: &[WalkRoot],
    extensions: &HashSet<String>,
    tx: &mpsc::Sender<WorkItem>,
    cancel: &CancellationToken,
    stats: &SyncStats,
) -> Result<()> {
    for root in roots {
        tracing::info!(root = %root.name, dir = %root.dir.display(), "walking root");

        let walker = WalkDir::new(&root.dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !root.excluded.iter().any(|x| e.path() == x));

        for entry in walker {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let entry = entry.map_err(|e| Error::pipeline(STAGE, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            // An empty allow-set admits every file, extensionless ones included.
            let ext = extension_of(entry.path()).unwrap_or_default();
            if !extensions.is_empty() && !extensions.contains(&ext) {
                continue;
            }

            let facts = file_facts(root, entry.path(), ext)
                .map_err(|e| Error::pipeline(STAGE, format!("{}: {e}", entry.path().display())))?;
            tracing::trace!(path = %entry.path().display(), "file found");
            stats.seen.incr();

            if tx.blocking_send(WorkItem::new(facts)).is_err() {
                // Downstream is gone; the run is being torn down.
                return Ok(());
            }
        }
    }
    Ok(())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

fn file_facts(root: &WalkRoot, full: &Path, ext: String) -> io::Result<FileFacts> {
    let meta = full.metadata()?;
    let mtime = DateTime::<Utc>::from(meta.modified()?).timestamp();

    let dir = full.parent().unwrap_or(&root.dir);
    let path = dir
        .strip_prefix(&root.dir)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    let filename = full
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let sidecar = sidecar_path(full);
    let (meta_hash, sidecar) = if sidecar.is_file() {
        (hash_file(&sidecar)?, Some(sidecar))
    } else {
        (String::new(), None)
    };

    Ok(FileFacts {
        root: root.name.clone(),
        root_dir: root.dir.clone(),
        path,
        filename,
        ext,
        size: i64::try_from(meta.len()).unwrap_or(i64::MAX),
        mtime,
        file_hash: hash_file(full)?,
        meta_hash,
        sidecar,
    })
}

/// `<file>.xmp` next to the file.
pub fn sidecar_path(full: &Path) -> PathBuf {
    let mut name = full.as_os_str().to_owned();
    name.push(".");
    name.push(SIDECAR_EXT);
    PathBuf::from(name)
}

/// SHA-256 hex of a file's content.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

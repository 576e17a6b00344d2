//! Decides whether a known file needs reprocessing.
//!
//! Checks run in a fixed order and the first mismatch names the reason:
//! content hash, sidecar hash, size, then mtime. The order only changes
//! which reason gets recorded.

use std::sync::Arc;

use async_trait::async_trait;
use sb_core::{DirtyReason, Result};
use sb_db::models::ImageRecord;

use crate::item::{FileFacts, WorkItem};
use crate::report::SyncStats;
use crate::stage::Stage;

pub struct DirtyStage {
    stats: Arc<SyncStats>,
}

impl DirtyStage {
    pub fn new(stats: Arc<SyncStats>) -> Self {
        Self { stats }
    }
}

/// First difference between the file and its stored record.
pub fn classify(file: &FileFacts, rec: &ImageRecord) -> Option<DirtyReason> {
    if file.file_hash != rec.file_hash {
        Some(DirtyReason::HashChanged)
    } else if file.meta_hash != rec.meta_hash {
        Some(DirtyReason::MetadataHashChanged)
    } else if file.size != rec.file_size {
        Some(DirtyReason::SizeChanged)
    } else if file.mtime != rec.mtime {
        Some(DirtyReason::MtimeChanged)
    } else {
        None
    }
}

#[async_trait]
impl Stage for DirtyStage {
    fn name(&self) -> &'static str {
        "dirty"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        let changed = match item.record() {
            Some(rec) if !item.is_dirty() => classify(item.file(), rec),
            _ => None,
        };
        let item = match changed {
            Some(reason) => item.mark_dirty(reason),
            None => item,
        };

        match item.dirty_reason() {
            Some(reason) => {
                tracing::debug!(path = %item.full_path().display(), reason = %reason, "dirty");
                self.stats.dirty.incr();
            }
            None => {
                tracing::debug!(path = %item.full_path().display(), "unchanged");
                self.stats.unchanged.incr();
            }
        }
        Ok(Some(item))
    }
}

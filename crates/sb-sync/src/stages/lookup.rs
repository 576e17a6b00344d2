//! Attaches the catalogue record to each item, or synthesizes one.

use std::sync::Arc;

use async_trait::async_trait;
use sb_core::{DirtyReason, Result};
use sb_db::models::ImageRecord;
use sb_db::pool::{get_conn, DbPool};
use sb_db::queries::{images, tags};

use crate::item::WorkItem;
use crate::report::SyncStats;
use crate::stage::Stage;

pub struct LookupStage {
    pool: DbPool,
    /// Every known file is reprocessed.
    force: bool,
    stats: Arc<SyncStats>,
}

impl LookupStage {
    pub fn new(pool: DbPool, force: bool, stats: Arc<SyncStats>) -> Self {
        Self { pool, force, stats }
    }
}

#[async_trait]
impl Stage for LookupStage {
    fn name(&self) -> &'static str {
        "lookup"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        let conn = get_conn(&self.pool)?;
        let found = images::get_image_by_location(&conn, item.root(), item.path(), item.filename())?;

        let item = match found {
            None => {
                tracing::info!(path = %item.full_path().display(), "new file");
                self.stats.new.incr();
                let rec = ImageRecord::new(item.root(), item.path(), item.filename(), item.ext());
                item.with_record(rec, Vec::new())
                    .mark_dirty(DirtyReason::NewFile)
            }
            Some(rec) => {
                let prior_tags = tags::list_tag_paths(&conn, rec.id)?;
                let item = item.with_record(rec, prior_tags);
                if self.force {
                    item.mark_dirty(DirtyReason::ForcedRefresh)
                } else {
                    item
                }
            }
        };
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::test_support::file;
    use sb_core::SyncMode;
    use sb_db::pool::init_memory_pool;
    use sb_db::queries::sync_runs;

    fn seeded_pool() -> DbPool {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let run = sync_runs::create_sync_run(&conn, SyncMode::Full, "h", false).unwrap();
        let rec = ImageRecord::new("photos", "2024", "known.jpg", "jpg");
        images::save_image(&conn, &rec, &["Travel/Iceland".into()], run.id).unwrap();
        pool
    }

    #[tokio::test]
    async fn unknown_file_gets_new_public_record() {
        let stats = Arc::new(SyncStats::default());
        let stage = LookupStage::new(seeded_pool(), false, stats.clone());

        let item = stage
            .process(WorkItem::new(file("2024", "fresh.jpg")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.dirty_reason(), Some(DirtyReason::NewFile));
        let rec = item.record().unwrap();
        assert_eq!(rec.filename, "fresh.jpg");
        assert_eq!(rec.acl(), sb_core::AclDecision::default());
        assert_eq!(stats.new.get(), 1);
    }

    #[tokio::test]
    async fn known_file_attaches_record_and_tags() {
        let stage = LookupStage::new(seeded_pool(), false, Arc::new(SyncStats::default()));
        let item = stage
            .process(WorkItem::new(file("2024", "known.jpg")))
            .await
            .unwrap()
            .unwrap();
        assert!(!item.is_dirty());
        assert_eq!(item.prior_tags(), ["Travel/Iceland"]);
    }

    #[tokio::test]
    async fn force_marks_known_files() {
        let stage = LookupStage::new(seeded_pool(), true, Arc::new(SyncStats::default()));
        let known = stage
            .process(WorkItem::new(file("2024", "known.jpg")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(known.dirty_reason(), Some(DirtyReason::ForcedRefresh));

        let fresh = stage
            .process(WorkItem::new(file("2024", "fresh.jpg")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.dirty_reason(), Some(DirtyReason::NewFile));
    }
}

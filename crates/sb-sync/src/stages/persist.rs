//! Writes items back to the catalogue and stamps them as seen.

use std::sync::Arc;

use async_trait::async_trait;
use sb_core::{Result, SyncRunId};
use sb_db::models::ImageRecord;
use sb_db::pool::{get_conn, DbPool, PooledConnection};
use sb_db::queries::images;

use crate::item::WorkItem;
use crate::mapper;
use crate::report::SyncStats;
use crate::stage::Stage;

pub struct PersistStage {
    pool: DbPool,
    run_id: SyncRunId,
    acl_override: bool,
    stats: Arc<SyncStats>,
}

impl PersistStage {
    pub fn new(pool: DbPool, run_id: SyncRunId, acl_override: bool, stats: Arc<SyncStats>) -> Self {
        Self {
            pool,
            run_id,
            acl_override,
            stats,
        }
    }

    /// Full rewrite of a dirty item: record, tags and stamp in one
    /// transaction.
    fn write_dirty(&self, conn: &PooledConnection, item: &WorkItem, base: &ImageRecord) -> Result<()> {
        let mut rec = base.clone();
        mapper::apply_file_facts(&mut rec, item.file());

        let tags = match item.metadata() {
            Some(md) => {
                mapper::apply_metadata(&mut rec, md)?;
                md.tags()
            }
            None => item.prior_tags().to_vec(),
        };
        if let Some(acl) = item.acl() {
            rec.set_acl(acl);
        }
        if let Some(panorama) = item.panorama() {
            rec.panorama = panorama;
        }
        rec.last_seen_sync = Some(self.run_id);

        images::save_image(conn, &rec, &tags, self.run_id)?;
        Ok(())
    }

    /// Stamp a clean item, carrying a changed ACL under override.
    fn write_clean(&self, conn: &PooledConnection, item: &WorkItem, base: &ImageRecord) -> Result<()> {
        match item.acl() {
            Some(acl) if self.acl_override && acl != base.acl() => {
                tracing::debug!(
                    path = %item.full_path().display(),
                    from = %base.acl_scope,
                    to = %acl.scope,
                    "ACL changed"
                );
                images::update_acl_and_touch(conn, base.id, acl, self.run_id)?;
            }
            _ => {
                images::touch_image(conn, base.id, self.run_id)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for PersistStage {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        let Some(base) = item.record() else {
            tracing::warn!(path = %item.full_path().display(), "no record attached; skipping file");
            self.stats.write_failed.incr();
            return Ok(None);
        };

        let conn = get_conn(&self.pool)?;

        let written = if item.is_dirty() {
            self.write_dirty(&conn, &item, base)
        } else {
            self.write_clean(&conn, &item, base)
        };

        if let Err(e) = written {
            tracing::warn!(path = %item.full_path().display(), error = %e, "write failed; skipping file");
            self.stats.write_failed.incr();
            return Ok(None);
        }

        if item.is_dirty() {
            if let Some(note) = item.note() {
                tracing::debug!(path = %item.full_path().display(), note, "persisted with note");
            }
            self.stats.persisted.incr();
        } else {
            self.stats.touched.incr();
        }
        Ok(Some(item))
    }
}

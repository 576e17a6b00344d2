//! Runs one sync: opens the run row, wires the stage chain, cleans up
//! vanished files and closes the run.

use std::sync::Arc;

use sb_core::config::Config;
use sb_core::{Error, Result, SyncMode, SyncRunId};
use sb_db::models::SyncTotals;
use sb_db::pool::{get_conn, DbPool, PooledConnection};
use sb_db::queries::{images, sync_runs};
use sb_metadata::MetadataReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::report::{SyncReport, SyncStats};
use crate::stage::{spawn_sink, spawn_stage, CHANNEL_CAPACITY};
use crate::stages::{
    spawn_walker, AclStage, DirtyStage, ExtractStage, FilterStage, LookupStage, PersistStage,
    WalkRoot,
};

/// Per-invocation switches layered over the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Remove records of files that were not seen (full mode).
    pub cleanup: bool,
    /// Reprocess every known file.
    pub force: bool,
}

impl SyncOptions {
    /// Options from `[sync]`, with `cleanup`/`force` from the command line
    /// added on top.
    pub fn from_config(config: &Config, cleanup: bool, force: bool) -> Self {
        Self {
            cleanup: cleanup || config.sync.cleanup,
            force: force || config.sync.force,
        }
    }

    pub fn mode(&self) -> SyncMode {
        if self.cleanup {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        }
    }
}

/// Run a complete sync of every configured root.
///
/// The run is recorded in `sync_runs` and closed exactly once. A fatal
/// stage error, a failed cleanup or cancellation through `cancel` closes it
/// as failed and is returned as the error.
pub async fn run_sync(
    config: &Config,
    pool: &DbPool,
    reader: Arc<dyn MetadataReader>,
    options: SyncOptions,
    cancel: CancellationToken,
) -> Result<SyncReport> {
    if config.filesystem.roots.is_empty() {
        return Err(Error::Validation("no filesystem roots configured".into()));
    }

    let mode = options.mode();
    let schema_hash = config.sync.metadata_hash()?;

    let run = {
        let conn = get_conn(pool)?;
        let schema_changed = sync_runs::last_successful_schema_hash(&conn)?
            .is_some_and(|last| last != schema_hash);
        if schema_changed {
            tracing::info!("metadata field mapping changed; refreshing every file");
        }
        let force = options.force || schema_changed;
        sync_runs::create_sync_run(&conn, mode, &schema_hash, force)?
    };
    tracing::info!(run_id = %run.id, mode = %mode, force = run.force, "sync started");

    let stats = Arc::new(SyncStats::default());
    let outcome = execute(config, pool, reader, run.id, run.force, mode, &stats, &cancel).await;

    let totals = SyncTotals {
        seen: stats.seen.get() as i64,
        updated: stats.persisted.get() as i64,
        deleted: stats.deleted.get() as i64,
    };
    let outcome = outcome.and_then(|()| {
        close_connection(pool).and_then(|conn| sync_runs::close_success(&conn, run.id, totals))
    });
    match outcome {
        Ok(()) => {
            let report = stats.report(run.id, mode, run.force);
            tracing::info!(
                run_id = %run.id,
                seen = report.seen,
                persisted = report.persisted,
                touched = report.touched,
                deleted = report.deleted,
                "sync finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(run_id = %run.id, error = %e, "sync failed");
            let closed = close_connection(pool)
                .and_then(|conn| sync_runs::close_error(&conn, run.id, totals, &e.to_string()));
            if let Err(close_err) = closed {
                tracing::error!(
                    run_id = %run.id,
                    error = %close_err,
                    "could not record failed sync run"
                );
            }
            Err(e)
        }
    }
}

/// A connection for closing the run row, retried once when the pool is
/// momentarily exhausted.
fn close_connection(pool: &DbPool) -> Result<PooledConnection> {
    get_conn(pool).or_else(|e| {
        tracing::warn!(error = %e, "retrying connection to close sync run");
        get_conn(pool)
    })
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    config: &Config,
    pool: &DbPool,
    reader: Arc<dyn MetadataReader>,
    run_id: SyncRunId,
    force: bool,
    mode: SyncMode,
    stats: &Arc<SyncStats>,
    external: &CancellationToken,
) -> Result<()> {
    // A child token: stage failures stop this run without touching the
    // caller's token, while the caller can still stop the run.
    let cancel = external.child_token();

    let roots = config
        .filesystem
        .roots
        .iter()
        .map(|(name, root)| WalkRoot::new(name, &root.root, &root.excluded))
        .collect();

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut handles: Vec<(&'static str, JoinHandle<Result<()>>)> = Vec::with_capacity(8);
    handles.push((
        "walker",
        spawn_walker(
            roots,
            config.sync.normalized_extensions(),
            tx,
            cancel.clone(),
            stats.clone(),
        ),
    ));

    let (rx, h) = spawn_stage(
        LookupStage::new(pool.clone(), force, stats.clone()),
        rx,
        cancel.clone(),
    );
    handles.push(("lookup", h));
    let (rx, h) = spawn_stage(DirtyStage::new(stats.clone()), rx, cancel.clone());
    handles.push(("dirty", h));
    let (rx, h) = spawn_stage(
        ExtractStage::new(reader, config.sync.panorama.as_ref(), stats.clone()),
        rx,
        cancel.clone(),
    );
    handles.push(("extract", h));
    let (rx, h) = spawn_stage(
        FilterStage::new(&config.sync.paths, stats.clone()),
        rx,
        cancel.clone(),
    );
    handles.push(("filter", h));
    let (rx, h) = spawn_stage(
        AclStage::new(&config.sync.acl, config.sync.acl_override),
        rx,
        cancel.clone(),
    );
    handles.push(("acl", h));
    let (rx, h) = spawn_stage(
        PersistStage::new(pool.clone(), run_id, config.sync.acl_override, stats.clone()),
        rx,
        cancel.clone(),
    );
    handles.push(("persist", h));
    handles.push(("sink", spawn_sink(rx, cancel.clone())));

    let mut first_error = None;
    for (name, handle) in handles {
        let result = handle
            .await
            .unwrap_or_else(|e| Err(Error::pipeline(name, format!("task panicked: {e}"))));
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if mode == SyncMode::Full {
        delete_unseen(pool, run_id, stats, &cancel)?;
    }
    Ok(())
}

/// Remove every record not stamped by `run_id`, one batch at a time.
fn delete_unseen(
    pool: &DbPool,
    run_id: SyncRunId,
    stats: &SyncStats,
    cancel: &CancellationToken,
) -> Result<()> {
    let conn = get_conn(pool)?;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = images::delete_not_seen(&conn, run_id, images::DELETE_BATCH_SIZE)?;
        if n == 0 {
            break;
        }
        tracing::debug!(run_id = %run_id, deleted = n, "cleanup batch");
        stats.deleted.add(n as u64);
    }
    if stats.deleted.get() > 0 {
        tracing::info!(run_id = %run_id, deleted = stats.deleted.get(), "removed vanished files");
    }
    Ok(())
}

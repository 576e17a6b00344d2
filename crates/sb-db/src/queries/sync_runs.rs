//! Sync run lifecycle.
//!
//! A run is created in `running` state and closed exactly once, either as
//! `finished` with totals or as `failed` with a message.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sb_core::{Error, Result, SyncMode, SyncRunId, SyncStatus};

use crate::models::{SyncRun, SyncTotals};

const COLS: &str =
    "id, mode, schema_hash, force, status, seen, updated, deleted, error, started_at, finished_at";

/// Insert a new run in `running` state.
pub fn create_sync_run(
    conn: &Connection,
    mode: SyncMode,
    schema_hash: &str,
    force: bool,
) -> Result<SyncRun> {
    let id = SyncRunId::new();
    let started_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO sync_runs (id, mode, schema_hash, force, status, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            mode.as_str(),
            schema_hash,
            force,
            SyncStatus::Running.as_str(),
            started_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(SyncRun {
        id,
        mode,
        schema_hash: schema_hash.to_string(),
        force,
        status: SyncStatus::Running,
        totals: SyncTotals::default(),
        error: None,
        started_at,
        finished_at: None,
    })
}

fn close(
    conn: &Connection,
    id: SyncRunId,
    status: SyncStatus,
    totals: SyncTotals,
    error: Option<&str>,
) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE sync_runs
             SET status = ?1, seen = ?2, updated = ?3, deleted = ?4, error = ?5, finished_at = ?6
             WHERE id = ?7 AND status = ?8",
            params![
                status.as_str(),
                totals.seen,
                totals.updated,
                totals.deleted,
                error,
                Utc::now().to_rfc3339(),
                id.to_string(),
                SyncStatus::Running.as_str(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if n == 0 {
        return Err(Error::Validation(format!("sync run {id} is not running")));
    }
    Ok(())
}

/// Mark a run finished with its totals.
pub fn close_success(conn: &Connection, id: SyncRunId, totals: SyncTotals) -> Result<()> {
    close(conn, id, SyncStatus::Finished, totals, None)
}

/// Mark a run failed with an error message.
pub fn close_error(
    conn: &Connection,
    id: SyncRunId,
    totals: SyncTotals,
    message: &str,
) -> Result<()> {
    close(conn, id, SyncStatus::Failed, totals, Some(message))
}

/// Schema hash stored by the most recent finished run, if any.
pub fn last_successful_schema_hash(conn: &Connection) -> Result<Option<String>> {
    conn.query_row(
        "SELECT schema_hash FROM sync_runs WHERE status = ?1
         ORDER BY rowid DESC LIMIT 1",
        [SyncStatus::Finished.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a run by primary key.
pub fn get_sync_run(conn: &Connection, id: SyncRunId) -> Result<Option<SyncRun>> {
    let q = format!("SELECT {COLS} FROM sync_runs WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], SyncRun::from_row);
    match result {
        Ok(run) => Ok(Some(run)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Most recent runs first.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<SyncRun>> {
    let q = format!("SELECT {COLS} FROM sync_runs ORDER BY rowid DESC LIMIT ?1");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit as i64], SyncRun::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

//! Image record operations used by the sync pipeline.

use chrono::Utc;
use rusqlite::{params, Connection};
use sb_core::{AclDecision, Error, ImageId, Result, SyncRunId};

use crate::models::{ImageRecord, TAKEN_AT_FORMAT};
use crate::queries::tags;

const COLS: &str = "id, root, path, filename, ext, file_size, mtime, file_hash, meta_hash, \
    title, subject, camera, lens, focal_length, aperture, exposure, iso, latitude, longitude, \
    rotation, rating, width, height, taken_at, panorama, exif_json, focus_mode, acl_scope, \
    acl_user_id, last_seen_sync, created_at, updated_at, focus_x, focus_y";

/// Number of rows removed per cleanup batch.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Find an image by its location inside a root.
pub fn get_image_by_location(
    conn: &Connection,
    root: &str,
    path: &str,
    filename: &str,
) -> Result<Option<ImageRecord>> {
    let q = format!("SELECT {COLS} FROM images WHERE root = ?1 AND path = ?2 AND filename = ?3");
    let result = conn.query_row(&q, params![root, path, filename], ImageRecord::from_row);
    match result {
        Ok(rec) => Ok(Some(rec)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get an image by primary key.
pub fn get_image(conn: &Connection, id: ImageId) -> Result<Option<ImageRecord>> {
    let q = format!("SELECT {COLS} FROM images WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], ImageRecord::from_row);
    match result {
        Ok(rec) => Ok(Some(rec)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Create or update a record, replace its tag bindings and stamp it as seen
/// by `run_id`, all in one transaction.
///
/// Returns the id the row is stored under, which is the existing row's id
/// when the location was already catalogued.
pub fn save_image(
    conn: &Connection,
    rec: &ImageRecord,
    tag_paths: &[String],
    run_id: SyncRunId,
) -> Result<ImageId> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let id = upsert_image(&tx, rec, run_id)?;
    tags::replace_image_tags(&tx, id, tag_paths)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(id)
}

fn upsert_image(conn: &Connection, rec: &ImageRecord, run_id: SyncRunId) -> Result<ImageId> {
    let now = Utc::now().to_rfc3339();
    let taken_at = rec.taken_at.map(|t| t.format(TAKEN_AT_FORMAT).to_string());

    let id: String = conn
        .query_row(
            "INSERT INTO images (id, root, path, filename, ext, file_size, mtime, file_hash,
                meta_hash, title, subject, camera, lens, focal_length, aperture, exposure, iso,
                latitude, longitude, rotation, rating, width, height, taken_at, panorama,
                exif_json, focus_mode, acl_scope, acl_user_id, last_seen_sync, created_at,
                updated_at, focus_x, focus_y)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,
                ?21,?22,?23,?24,?25,?26,?27,?28,?29,?30,?31,?32,?33,?34)
             ON CONFLICT (root, path, filename) DO UPDATE SET
                ext = excluded.ext,
                file_size = excluded.file_size,
                mtime = excluded.mtime,
                file_hash = excluded.file_hash,
                meta_hash = excluded.meta_hash,
                title = excluded.title,
                subject = excluded.subject,
                camera = excluded.camera,
                lens = excluded.lens,
                focal_length = excluded.focal_length,
                aperture = excluded.aperture,
                exposure = excluded.exposure,
                iso = excluded.iso,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                rotation = excluded.rotation,
                rating = excluded.rating,
                width = excluded.width,
                height = excluded.height,
                taken_at = excluded.taken_at,
                panorama = excluded.panorama,
                exif_json = excluded.exif_json,
                focus_mode = excluded.focus_mode,
                focus_x = excluded.focus_x,
                focus_y = excluded.focus_y,
                acl_scope = excluded.acl_scope,
                acl_user_id = excluded.acl_user_id,
                last_seen_sync = excluded.last_seen_sync,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                rec.id.to_string(),
                rec.root,
                rec.path,
                rec.filename,
                rec.ext,
                rec.file_size,
                rec.mtime,
                rec.file_hash,
                rec.meta_hash,
                rec.title,
                rec.subject,
                rec.camera,
                rec.lens,
                rec.focal_length,
                rec.aperture,
                rec.exposure,
                rec.iso,
                rec.latitude,
                rec.longitude,
                rec.rotation,
                rec.rating,
                rec.width,
                rec.height,
                taken_at,
                rec.panorama,
                rec.exif_json,
                rec.focus_mode.as_str(),
                rec.acl_scope.as_str(),
                rec.acl_user_id.map(|u| u.to_string()),
                run_id.to_string(),
                rec.created_at,
                now,
                rec.focus_x.map(f64::from),
                rec.focus_y.map(f64::from),
            ],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    id.parse()
        .map_err(|e: uuid::Error| Error::database(format!("invalid image id {id}: {e}")))
}

/// Stamp an unchanged image as seen by `run_id`.
pub fn touch_image(conn: &Connection, id: ImageId, run_id: SyncRunId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE images SET last_seen_sync = ?1 WHERE id = ?2",
            params![run_id.to_string(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Stamp an unchanged image and overwrite its access decision.
pub fn update_acl_and_touch(
    conn: &Connection,
    id: ImageId,
    acl: AclDecision,
    run_id: SyncRunId,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE images SET acl_scope = ?1, acl_user_id = ?2, last_seen_sync = ?3,
                updated_at = ?4
             WHERE id = ?5",
            params![
                acl.scope.as_str(),
                acl.owner.map(|u| u.to_string()),
                run_id.to_string(),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete up to `limit` images not stamped by `run_id`. Returns the number
/// of rows removed; callers repeat until it returns zero.
pub fn delete_not_seen(conn: &Connection, run_id: SyncRunId, limit: usize) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let n = tx
        .execute(
            "DELETE FROM images WHERE id IN (
                SELECT id FROM images
                WHERE last_seen_sync IS NULL OR last_seen_sync <> ?1
                LIMIT ?2
             )",
            params![run_id.to_string(), limit as i64],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(n)
}

/// Total number of catalogued images.
pub fn count_images(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

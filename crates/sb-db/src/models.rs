//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row` selected with the column list its query module uses.

use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use sb_core::{
    AclDecision, AclScope, FocusMode, ImageId, SyncMode, SyncRunId, SyncStatus, TagId, UserId,
};
use uuid::Uuid;

/// Storage format of `images.taken_at`.
pub const TAKEN_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => {
            let uuid = Uuid::parse_str(&v).map_err(|e| conversion_error(idx, e))?;
            Ok(Some(T::from(uuid)))
        }
        None => Ok(None),
    }
}

/// Parse a text-encoded enum column.
fn parse_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_opt_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| NaiveDateTime::parse_from_str(&v, TAKEN_AT_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

// ---------------------------------------------------------------------------
// ImageRecord
// ---------------------------------------------------------------------------

/// One catalogued image.
///
/// `mtime` is stored in whole seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: ImageId,
    pub root: String,
    pub path: String,
    pub filename: String,
    pub ext: String,
    pub file_size: i64,
    pub mtime: i64,
    pub file_hash: String,
    pub meta_hash: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub focal_length: Option<f64>,
    pub aperture: Option<f64>,
    pub exposure: Option<f64>,
    pub iso: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rotation: i32,
    pub rating: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub taken_at: Option<NaiveDateTime>,
    pub panorama: bool,
    pub exif_json: String,
    pub focus_mode: FocusMode,
    /// Manual crop anchor as fractions of width and height.
    pub focus_x: Option<f32>,
    pub focus_y: Option<f32>,
    pub acl_scope: AclScope,
    pub acl_user_id: Option<UserId>,
    pub last_seen_sync: Option<SyncRunId>,
    pub created_at: String,
    pub updated_at: String,
}

impl ImageRecord {
    /// A record for a file the catalogue has never seen: auto focus, public.
    pub fn new(
        root: impl Into<String>,
        path: impl Into<String>,
        filename: impl Into<String>,
        ext: impl Into<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: ImageId::new(),
            root: root.into(),
            path: path.into(),
            filename: filename.into(),
            ext: ext.into(),
            file_size: 0,
            mtime: 0,
            file_hash: String::new(),
            meta_hash: String::new(),
            title: None,
            subject: None,
            camera: None,
            lens: None,
            focal_length: None,
            aperture: None,
            exposure: None,
            iso: None,
            latitude: None,
            longitude: None,
            rotation: 0,
            rating: None,
            width: 0,
            height: 0,
            taken_at: None,
            panorama: false,
            exif_json: "{}".to_string(),
            focus_mode: FocusMode::Auto,
            focus_x: None,
            focus_y: None,
            acl_scope: AclScope::Public,
            acl_user_id: None,
            last_seen_sync: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn acl(&self) -> AclDecision {
        AclDecision {
            scope: self.acl_scope,
            owner: self.acl_user_id,
        }
    }

    pub fn set_acl(&mut self, acl: AclDecision) {
        self.acl_scope = acl.scope;
        self.acl_user_id = acl.owner;
    }

    /// Location relative to the root, e.g. `2024/iceland/IMG_0001.jpg`.
    pub fn relative_path(&self) -> String {
        if self.path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.path, self.filename)
        }
    }

    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let width: i64 = row.get(21)?;
        let height: i64 = row.get(22)?;
        Ok(Self {
            id: parse_id(row, 0)?,
            root: row.get(1)?,
            path: row.get(2)?,
            filename: row.get(3)?,
            ext: row.get(4)?,
            file_size: row.get(5)?,
            mtime: row.get(6)?,
            file_hash: row.get(7)?,
            meta_hash: row.get(8)?,
            title: row.get(9)?,
            subject: row.get(10)?,
            camera: row.get(11)?,
            lens: row.get(12)?,
            focal_length: row.get(13)?,
            aperture: row.get(14)?,
            exposure: row.get(15)?,
            iso: row.get(16)?,
            latitude: row.get(17)?,
            longitude: row.get(18)?,
            rotation: row.get(19)?,
            rating: row.get(20)?,
            width: u32::try_from(width).unwrap_or(0),
            height: u32::try_from(height).unwrap_or(0),
            taken_at: parse_opt_datetime(row, 23)?,
            panorama: row.get(24)?,
            exif_json: row.get(25)?,
            focus_mode: parse_text(row, 26)?,
            focus_x: row.get::<_, Option<f64>>(32)?.map(|v| v as f32),
            focus_y: row.get::<_, Option<f64>>(33)?.map(|v| v as f32),
            acl_scope: parse_text(row, 27)?,
            acl_user_id: parse_opt_id(row, 28)?,
            last_seen_sync: parse_opt_id(row, 29)?,
            created_at: row.get(30)?,
            updated_at: row.get(31)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub parent_id: Option<TagId>,
    pub name: String,
    pub source: String,
}

impl Tag {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            parent_id: parse_opt_id(row, 1)?,
            name: row.get(2)?,
            source: row.get(3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// SyncRun
// ---------------------------------------------------------------------------

/// Totals written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub seen: i64,
    pub updated: i64,
    pub deleted: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub mode: SyncMode,
    pub schema_hash: String,
    pub force: bool,
    pub status: SyncStatus,
    pub totals: SyncTotals,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl SyncRun {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            mode: parse_text(row, 1)?,
            schema_hash: row.get(2)?,
            force: row.get(3)?,
            status: parse_text(row, 4)?,
            totals: SyncTotals {
                seen: row.get(5)?,
                updated: row.get(6)?,
                deleted: row.get(7)?,
            },
            error: row.get(8)?,
            started_at: row.get(9)?,
            finished_at: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults_open() {
        let rec = ImageRecord::new("photos", "2024", "a.jpg", "jpg");
        assert_eq!(rec.acl(), AclDecision::default());
        assert_eq!(rec.focus_mode, FocusMode::Auto);
        assert!(rec.last_seen_sync.is_none());
        assert_eq!(rec.exif_json, "{}");
    }

    #[test]
    fn relative_path_at_root() {
        assert_eq!(
            ImageRecord::new("photos", "", "a.jpg", "jpg").relative_path(),
            "a.jpg"
        );
        assert_eq!(
            ImageRecord::new("photos", "2024/x", "a.jpg", "jpg").relative_path(),
            "2024/x/a.jpg"
        );
    }

    #[test]
    fn set_acl_updates_both_columns() {
        let mut rec = ImageRecord::new("photos", "", "a.jpg", "jpg");
        let owner = UserId::new();
        rec.set_acl(AclDecision {
            scope: AclScope::User,
            owner: Some(owner),
        });
        assert_eq!(rec.acl_scope, AclScope::User);
        assert_eq!(rec.acl_user_id, Some(owner));
    }
}

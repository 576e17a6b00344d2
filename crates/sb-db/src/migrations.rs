//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;
use sb_core::{Error, Result};

/// V1: initial schema -- sync runs, images, the tag tree and its bindings.
const V1_INITIAL: &str = r#"
-- One row per sync invocation
CREATE TABLE sync_runs (
    id          TEXT PRIMARY KEY,
    mode        TEXT NOT NULL,
    schema_hash TEXT NOT NULL,
    force       INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'running',
    seen        INTEGER NOT NULL DEFAULT 0,
    updated     INTEGER NOT NULL DEFAULT 0,
    deleted     INTEGER NOT NULL DEFAULT 0,
    error       TEXT,
    started_at  TEXT NOT NULL,
    finished_at TEXT
);

-- Catalogued images
CREATE TABLE images (
    id             TEXT PRIMARY KEY,
    root           TEXT NOT NULL,
    path           TEXT NOT NULL,
    filename       TEXT NOT NULL,
    ext            TEXT NOT NULL,
    file_size      INTEGER NOT NULL DEFAULT 0,
    mtime          INTEGER NOT NULL DEFAULT 0,
    file_hash      TEXT NOT NULL DEFAULT '',
    meta_hash      TEXT NOT NULL DEFAULT '',
    title          TEXT,
    subject        TEXT,
    camera         TEXT,
    lens           TEXT,
    focal_length   REAL,
    aperture       REAL,
    exposure       REAL,
    iso            INTEGER,
    latitude       REAL,
    longitude      REAL,
    rotation       INTEGER NOT NULL DEFAULT 0,
    rating         INTEGER,
    width          INTEGER NOT NULL DEFAULT 0,
    height         INTEGER NOT NULL DEFAULT 0,
    taken_at       TEXT,
    panorama       INTEGER NOT NULL DEFAULT 0,
    exif_json      TEXT NOT NULL DEFAULT '{}',
    focus_mode     TEXT NOT NULL DEFAULT 'auto',
    acl_scope      TEXT NOT NULL DEFAULT 'public',
    acl_user_id    TEXT,
    last_seen_sync TEXT REFERENCES sync_runs(id) ON DELETE SET NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    focus_x        REAL,
    focus_y        REAL,
    UNIQUE (root, path, filename)
);

-- Hierarchical tags; a root tag has no parent
CREATE TABLE tags (
    id        TEXT PRIMARY KEY,
    parent_id TEXT REFERENCES tags(id) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    source    TEXT NOT NULL DEFAULT 'metadata',
    UNIQUE (parent_id, name)
);

CREATE TABLE image_tags (
    image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    tag_id   TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (image_id, tag_id)
);

-- Indexes
CREATE INDEX idx_images_last_seen ON images(last_seen_sync);
CREATE INDEX idx_sync_runs_status ON sync_runs(status, started_at);
CREATE UNIQUE INDEX idx_tags_root_name ON tags(name) WHERE parent_id IS NULL;
CREATE INDEX idx_image_tags_tag ON image_tags(tag_id);
"#;

/// All migrations in order.  Each entry is `(version, sql)`.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations against the given connection.
///
/// Creates the `schema_migrations` bookkeeping table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn all_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["sync_runs", "images", "tags", "image_tags"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn root_tag_names_are_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute("INSERT INTO tags (id, name) VALUES ('a', 'Travel')", [])
            .unwrap();
        let dup = conn.execute("INSERT INTO tags (id, name) VALUES ('b', 'Travel')", []);
        assert!(dup.is_err());
    }
}

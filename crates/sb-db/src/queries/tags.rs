//! Tag tree operations.
//!
//! Tags form a forest keyed by `(parent_id, name)`. An image is bound to the
//! leaf node of each of its tag paths; the full path is rebuilt by walking
//! parents.

use rusqlite::{params, Connection, OptionalExtension};
use sb_core::metadata::split_tag_path;
use sb_core::{Error, ImageId, Result, TagId};

use crate::models::Tag;

/// `source` value of tags created from image metadata.
pub const METADATA_SOURCE: &str = "metadata";

const COLS: &str = "id, parent_id, name, source";

/// Find a direct child of `parent` (or a root tag when `parent` is `None`).
pub fn get_child(conn: &Connection, parent: Option<TagId>, name: &str) -> Result<Option<Tag>> {
    let q = format!("SELECT {COLS} FROM tags WHERE parent_id IS ?1 AND name = ?2");
    conn.query_row(
        &q,
        params![parent.map(|p| p.to_string()), name],
        Tag::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Make sure every node along `path` exists and return the leaf id.
///
/// Segments are split on `/` and trimmed; a path with no segments yields
/// `None`.
pub fn ensure_tag_path(conn: &Connection, path: &str, source: &str) -> Result<Option<TagId>> {
    let mut parent: Option<TagId> = None;
    for name in split_tag_path(path) {
        let id = match get_child(conn, parent, name)? {
            Some(tag) => tag.id,
            None => {
                let id = TagId::new();
                conn.execute(
                    "INSERT INTO tags (id, parent_id, name, source) VALUES (?1, ?2, ?3, ?4)",
                    params![id.to_string(), parent.map(|p| p.to_string()), name, source],
                )
                .map_err(|e| Error::database(e.to_string()))?;
                id
            }
        };
        parent = Some(id);
    }
    Ok(parent)
}

/// Clear an image's tag bindings and bind it to each of `paths`, creating
/// missing nodes. Callers wrap this in a transaction.
pub fn replace_image_tags(conn: &Connection, image_id: ImageId, paths: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM image_tags WHERE image_id = ?1",
        [image_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    for path in paths {
        let Some(leaf) = ensure_tag_path(conn, path, METADATA_SOURCE)? else {
            continue;
        };
        conn.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)",
            params![image_id.to_string(), leaf.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    }
    Ok(())
}

/// Full `/`-joined tag paths bound to an image.
pub fn list_tag_paths(conn: &Connection, image_id: ImageId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "WITH RECURSIVE chain(leaf, parent_id, name, depth) AS (
                SELECT t.id, t.parent_id, t.name, 0
                FROM image_tags it JOIN tags t ON t.id = it.tag_id
                WHERE it.image_id = ?1
                UNION ALL
                SELECT c.leaf, p.parent_id, p.name, c.depth + 1
                FROM chain c JOIN tags p ON p.id = c.parent_id
             )
             SELECT leaf, name FROM chain ORDER BY leaf, depth DESC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([image_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut paths: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    for (leaf, name) in rows {
        if current.as_deref() == Some(leaf.as_str()) {
            if let Some(last) = paths.last_mut() {
                last.push('/');
                last.push_str(&name);
            }
        } else {
            paths.push(name);
            current = Some(leaf);
        }
    }
    Ok(paths)
}

//! The per-file envelope threaded through the pipeline.

use std::path::{Path, PathBuf};

use sb_core::metadata::Metadata;
use sb_core::{AclDecision, DirtyReason};
use sb_db::models::ImageRecord;

/// What the walker learns about a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    /// Name of the configured root.
    pub root: String,
    /// Absolute directory of the root.
    pub root_dir: PathBuf,
    /// Directory relative to the root, `/`-separated, empty at the root.
    pub path: String,
    /// File name including its extension.
    pub filename: String,
    /// Lowercase extension without the dot.
    pub ext: String,
    pub size: i64,
    /// Modification time in whole seconds since the Unix epoch.
    pub mtime: i64,
    /// SHA-256 hex of the file content.
    pub file_hash: String,
    /// SHA-256 hex of the `.xmp` sidecar, empty without one.
    pub meta_hash: String,
    pub sidecar: Option<PathBuf>,
}

/// One file on its way through the stages.
///
/// Items move by value; every stage takes one and hands it on. Slots are
/// only ever filled: each `with_*`/`mark_*` builder leaves an already
/// filled slot as it was.
#[derive(Debug, Clone)]
pub struct WorkItem {
    file: FileFacts,
    record: Option<ImageRecord>,
    prior_tags: Vec<String>,
    dirty: Option<DirtyReason>,
    metadata: Option<Metadata>,
    acl: Option<AclDecision>,
    panorama: Option<bool>,
    note: Option<String>,
}

impl WorkItem {
    pub fn new(file: FileFacts) -> Self {
        Self {
            file,
            record: None,
            prior_tags: Vec::new(),
            dirty: None,
            metadata: None,
            acl: None,
            panorama: None,
            note: None,
        }
    }

    // -- file facts ---------------------------------------------------------

    pub fn file(&self) -> &FileFacts {
        &self.file
    }

    pub fn root(&self) -> &str {
        &self.file.root
    }

    pub fn path(&self) -> &str {
        &self.file.path
    }

    pub fn filename(&self) -> &str {
        &self.file.filename
    }

    pub fn ext(&self) -> &str {
        &self.file.ext
    }

    pub fn sidecar(&self) -> Option<&Path> {
        self.file.sidecar.as_deref()
    }

    /// Absolute path of the file.
    pub fn full_path(&self) -> PathBuf {
        let mut full = self.file.root_dir.clone();
        if !self.file.path.is_empty() {
            full.push(&self.file.path);
        }
        full.push(&self.file.filename);
        full
    }

    // -- attached state -----------------------------------------------------

    /// The catalogue record, present from the lookup stage on.
    pub fn record(&self) -> Option<&ImageRecord> {
        self.record.as_ref()
    }

    /// Tag paths the record carried before this run.
    pub fn prior_tags(&self) -> &[String] {
        &self.prior_tags
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn dirty_reason(&self) -> Option<DirtyReason> {
        self.dirty
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// The access decision made this run, if any rule matched.
    pub fn acl(&self) -> Option<AclDecision> {
        self.acl
    }

    pub fn panorama(&self) -> Option<bool> {
        self.panorama
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    // -- builders -----------------------------------------------------------

    /// Attach the prior (or freshly synthesized) record and its tags.
    #[must_use]
    pub fn with_record(mut self, record: ImageRecord, tags: Vec<String>) -> Self {
        if self.record.is_none() {
            self.record = Some(record);
            self.prior_tags = tags;
        }
        self
    }

    /// Mark the item for reprocessing. The first reason sticks.
    #[must_use]
    pub fn mark_dirty(mut self, reason: DirtyReason) -> Self {
        self.dirty.get_or_insert(reason);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.get_or_insert(metadata);
        self
    }

    #[must_use]
    pub fn with_acl(mut self, acl: AclDecision) -> Self {
        self.acl.get_or_insert(acl);
        self
    }

    #[must_use]
    pub fn with_panorama(mut self, panorama: bool) -> Self {
        self.panorama.get_or_insert(panorama);
        self
    }

    /// Attach a non-fatal note for the logs.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note.get_or_insert_with(|| note.into());
        self
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use sb_core::{AclScope, UserId};

    #[test]
    fn full_path_joins_root_dir() {
        let item = WorkItem::new(file("2024/iceland", "IMG_1.jpg"));
        assert_eq!(
            item.full_path(),
            PathBuf::from("/srv/photos/2024/iceland/IMG_1.jpg")
        );
        let at_root = WorkItem::new(file("", "IMG_1.jpg"));
        assert_eq!(at_root.full_path(), PathBuf::from("/srv/photos/IMG_1.jpg"));
    }

    #[test]
    fn first_dirty_reason_sticks() {
        let item = WorkItem::new(file("", "a.jpg"))
            .mark_dirty(DirtyReason::NewFile)
            .mark_dirty(DirtyReason::ForcedRefresh);
        assert_eq!(item.dirty_reason(), Some(DirtyReason::NewFile));
    }

    #[test]
    fn slots_are_never_replaced() {
        let first = AclDecision {
            scope: AclScope::Admin,
            owner: None,
        };
        let second = AclDecision {
            scope: AclScope::User,
            owner: Some(UserId::new()),
        };
        let item = clean_item("", "a.jpg")
            .with_record(ImageRecord::new("other", "", "b.jpg", "jpg"), vec!["X".into()])
            .with_acl(first)
            .with_acl(second)
            .with_panorama(true)
            .with_panorama(false)
            .with_note("first")
            .with_note("second");

        assert_eq!(item.record().unwrap().root, "photos");
        assert!(item.prior_tags().is_empty());
        assert_eq!(item.acl(), Some(first));
        assert_eq!(item.panorama(), Some(true));
        assert_eq!(item.note(), Some("first"));
    }
}

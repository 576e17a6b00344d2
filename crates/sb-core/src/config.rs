//! Configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML by the binary. Every
//! section defaults sensibly so an empty file is valid; a sync still needs
//! at least one root.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use sb_rules::RuleGroup;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::library::AclRole;
use crate::metadata::{merge_fields, schema_hash, MetadataFields};
use crate::UserId;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub filesystem: FilesystemConfig,
    pub sync: SyncConfig,
    pub derivatives: Vec<DerivativeConfig>,
    pub render: RenderConfig,
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shutterbox.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// FilesystemConfig
// ---------------------------------------------------------------------------

/// Originals are read-only roots; derivatives go to a writable cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Named library roots.
    pub roots: BTreeMap<String, RootConfig>,
    /// Directory derivative images are written to.
    pub derivatives: PathBuf,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            roots: BTreeMap::new(),
            derivatives: PathBuf::from("derivatives"),
        }
    }
}

/// One library root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub root: PathBuf,
    /// Sub-paths (relative to `root`) that are never descended into.
    #[serde(default)]
    pub excluded: Vec<String>,
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Allowed file extensions; empty allows every file.
    pub extensions: Vec<String>,
    /// Remove records of files that were not seen (full mode).
    pub cleanup: bool,
    /// Treat every file as dirty regardless of change detection.
    pub force: bool,
    /// Re-evaluate ACL rules for unchanged files too.
    pub acl_override: bool,
    /// Root/path scoped ingestion filters.
    pub paths: Vec<PathFilterConfig>,
    /// Ordered ACL rules; the first match wins.
    pub acl: Vec<AclRuleConfig>,
    /// Marks matching images as panoramas.
    pub panorama: Option<RuleGroup>,
    pub metadata: MetadataConfig,
    pub exiftool: ExiftoolConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "tif", "tiff", "heic"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cleanup: false,
            force: false,
            acl_override: false,
            paths: Vec::new(),
            acl: Vec::new(),
            panorama: None,
            metadata: MetadataConfig::default(),
            exiftool: ExiftoolConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Extensions lowercased and without a leading dot.
    pub fn normalized_extensions(&self) -> HashSet<String> {
        self.extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Configured metadata fields merged over the built-in defaults.
    pub fn metadata_fields(&self) -> MetadataFields {
        merge_fields(&self.metadata.fields)
    }

    /// Hash identifying the effective metadata field mapping.
    pub fn metadata_hash(&self) -> Result<String> {
        schema_hash(&self.metadata_fields())
    }
}

/// Filters applied to files of one root below a path prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathFilterConfig {
    /// Name of the root (key in `filesystem.roots`).
    pub root: String,
    /// Path prefix relative to the root; empty covers the whole root.
    #[serde(default)]
    pub path: String,
    pub filters: RuleGroup,
}

/// One ordered ACL rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclRuleConfig {
    pub role: AclRole,
    /// Owning user for `role = "user"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    /// The rule matches when any of these groups matches.
    pub rules: Vec<RuleGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Field overrides and additions, keyed by alias.
    pub fields: MetadataFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExiftoolConfig {
    /// Explicit executable; discovered on `PATH` when unset.
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Keep one `-stay_open` exiftool process for the whole run instead of
    /// starting one per file.
    pub stay_open: bool,
}

impl Default for ExiftoolConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: 30,
            stay_open: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Derivatives
// ---------------------------------------------------------------------------

/// How a derivative is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Fit inside the bounding box, keeping the aspect ratio.
    #[default]
    Fit,
    /// Cover the box and crop the overflow.
    Crop,
}

/// One derivative size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeConfig {
    pub name: String,
    /// Zero means "derive from the other dimension".
    #[serde(default)]
    pub max_width: u32,
    #[serde(default)]
    pub max_height: u32,
    #[serde(default)]
    pub mode: ResizeMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub workers: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

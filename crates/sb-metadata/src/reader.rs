//! The [`MetadataReader`] trait the sync pipeline extracts through.

use std::path::PathBuf;

use async_trait::async_trait;
use sb_core::metadata::Metadata;
use sb_core::Result;

/// Reads typed metadata for an image.
///
/// `paths` holds the image first, then any sidecars; a field found in a
/// later path overrides the same field from an earlier one. Implementations
/// must be safe to share across pipeline tasks.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    /// Human-readable name identifying this reader implementation.
    fn name(&self) -> &'static str;

    async fn extract(&self, paths: &[PathBuf]) -> Result<Metadata>;
}

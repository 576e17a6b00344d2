//! Reads metadata for dirty items and tags panoramas.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sb_core::Result;
use sb_metadata::MetadataReader;
use sb_rules::{CompiledFilter, RuleGroup};

use crate::facts;
use crate::item::WorkItem;
use crate::report::SyncStats;
use crate::stage::Stage;

pub struct ExtractStage {
    reader: Arc<dyn MetadataReader>,
    panorama: Option<CompiledFilter>,
    stats: Arc<SyncStats>,
}

impl ExtractStage {
    /// A panorama rule that fails to compile disables panorama tagging.
    pub fn new(
        reader: Arc<dyn MetadataReader>,
        panorama: Option<&RuleGroup>,
        stats: Arc<SyncStats>,
    ) -> Self {
        let panorama = panorama.and_then(|group| match group.compile() {
            Ok(filter) => Some(filter),
            Err(e) => {
                tracing::warn!(error = %e, "panorama rule does not compile; panorama tagging disabled");
                None
            }
        });
        Self {
            reader,
            panorama,
            stats,
        }
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn name(&self) -> &'static str {
        "extract"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        if !item.is_dirty() {
            return Ok(Some(item));
        }

        let mut paths: Vec<PathBuf> = vec![item.full_path()];
        if let Some(sidecar) = item.sidecar() {
            paths.push(sidecar.to_path_buf());
        }

        let metadata = match self.reader.extract(&paths).await {
            Ok(md) => md,
            Err(e) => {
                tracing::warn!(
                    path = %item.full_path().display(),
                    reader = self.reader.name(),
                    error = %e,
                    "metadata extraction failed; skipping file"
                );
                self.stats.extract_failed.incr();
                return Ok(None);
            }
        };

        let mut item = item.with_metadata(metadata);
        if let Some(filter) = &self.panorama {
            let panorama = filter.matches(&facts::project(&item));
            item = item.with_panorama(panorama);
        }
        if item.metadata().is_some_and(|md| md.width().is_none()) {
            item = item.with_note("no image dimensions in metadata");
        }
        Ok(Some(item))
    }
}

//! Root/path scoped inclusion filters.

use std::sync::Arc;

use async_trait::async_trait;
use sb_core::config::PathFilterConfig;
use sb_core::Result;
use sb_rules::CompiledFilter;

use crate::facts;
use crate::item::WorkItem;
use crate::report::SyncStats;
use crate::stage::Stage;

/// A compiled filter and where it applies.
struct Scope {
    root: String,
    /// Directory prefix without surrounding slashes; empty covers the root.
    prefix: String,
    filter: CompiledFilter,
}

impl Scope {
    fn covers(&self, item: &WorkItem) -> bool {
        if self.root != item.root() {
            return false;
        }
        let path = item.path();
        self.prefix.is_empty()
            || path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

pub struct FilterStage {
    scopes: Vec<Scope>,
    stats: Arc<SyncStats>,
}

impl FilterStage {
    /// Compile every scope once. A scope whose rules do not compile is
    /// disabled and logged.
    pub fn new(configs: &[PathFilterConfig], stats: Arc<SyncStats>) -> Self {
        let scopes = configs
            .iter()
            .filter_map(|cfg| match cfg.filters.compile() {
                Ok(filter) => Some(Scope {
                    root: cfg.root.clone(),
                    prefix: cfg.path.trim_matches('/').to_string(),
                    filter,
                }),
                Err(e) => {
                    tracing::warn!(
                        root = %cfg.root,
                        path = %cfg.path,
                        error = %e,
                        "path filter does not compile; scope disabled"
                    );
                    None
                }
            })
            .collect();
        Self { scopes, stats }
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        let mut applicable = self.scopes.iter().filter(|s| s.covers(&item)).peekable();
        if applicable.peek().is_none() {
            return Ok(Some(item));
        }

        let facts = facts::project(&item);
        for scope in applicable {
            if !scope.filter.matches(&facts) {
                tracing::debug!(
                    path = %item.full_path().display(),
                    scope = %scope.prefix,
                    "rejected by path filter"
                );
                self.stats.filtered.incr();
                return Ok(None);
            }
        }
        Ok(Some(item))
    }
}

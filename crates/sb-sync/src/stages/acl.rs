//! Assigns visibility and ownership from the ordered ACL rules.
//!
//! Rules are tried in declared order and the first match wins. When no rule
//! matches the item keeps whatever its record already had, which for a new
//! file is public.

use std::sync::Arc;

use async_trait::async_trait;
use sb_core::config::AclRuleConfig;
use sb_core::{AclDecision, Result};
use sb_rules::CompiledFilter;

use crate::facts;
use crate::item::WorkItem;
use crate::stage::Stage;

/// One compiled rule. It matches when any of its groups does.
struct AclRule {
    decision: AclDecision,
    groups: Vec<CompiledFilter>,
}

pub struct AclStage {
    rules: Arc<[AclRule]>,
    /// Re-evaluate clean items too.
    override_all: bool,
}

impl AclStage {
    /// Compile every rule once. A rule with a group that does not compile,
    /// or with no groups at all, is skipped and logged.
    pub fn new(configs: &[AclRuleConfig], override_all: bool) -> Self {
        let rules: Vec<AclRule> = configs
            .iter()
            .enumerate()
            .filter_map(|(index, cfg)| {
                if cfg.rules.is_empty() {
                    tracing::warn!(index, role = %cfg.role, "ACL rule without groups; skipped");
                    return None;
                }
                let groups = cfg
                    .rules
                    .iter()
                    .map(|g| g.compile())
                    .collect::<std::result::Result<Vec<_>, _>>();
                match groups {
                    Ok(groups) => Some(AclRule {
                        decision: AclDecision::for_role(cfg.role, cfg.user),
                        groups,
                    }),
                    Err(e) => {
                        tracing::warn!(index, role = %cfg.role, error = %e, "ACL rule does not compile; skipped");
                        None
                    }
                }
            })
            .collect();
        Self {
            rules: rules.into(),
            override_all,
        }
    }
}

#[async_trait]
impl Stage for AclStage {
    fn name(&self) -> &'static str {
        "acl"
    }

    async fn process(&self, item: WorkItem) -> Result<Option<WorkItem>> {
        if !item.is_dirty() && !self.override_all {
            return Ok(Some(item));
        }

        let facts = facts::project(&item);
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.groups.iter().any(|g| g.matches(&facts)));

        Ok(Some(match matched {
            Some(rule) => {
                tracing::debug!(
                    path = %item.full_path().display(),
                    scope = %rule.decision.scope,
                    "ACL rule matched"
                );
                item.with_acl(rule.decision)
            }
            None => item,
        }))
    }
}

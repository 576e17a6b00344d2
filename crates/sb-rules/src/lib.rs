//! # sb-rules
//!
//! The image rule DSL used by the sync pipeline to decide which files are
//! ingested, which images are panoramas and which access scope an image
//! receives.
//!
//! A [`RuleGroup`] combines atomic [`Rule`]s with `all` / `any` and may nest
//! further groups. Groups are decoded from configuration in two passes (read
//! the `type` discriminator, then decode the typed rule) and compiled once
//! into a [`CompiledFilter`], an immutable predicate over [`ImageFacts`] that
//! is shared across every item of a run.
//!
//! ```
//! use sb_rules::{ImageFacts, RuleGroup};
//!
//! let group: RuleGroup = serde_json::from_value(serde_json::json!({
//!     "op": "all",
//!     "rules": [
//!         { "type": "tag", "mode": "any", "tags": ["Travel"] },
//!         { "type": "extension", "mode": "any", "extensions": ["jpg"] }
//!     ]
//! }))
//! .unwrap();
//!
//! let filter = group.compile().unwrap();
//! let facts = ImageFacts {
//!     ext: "jpg".into(),
//!     tags: vec!["Travel/Iceland".into()],
//!     ..Default::default()
//! };
//! assert!(filter.matches(&facts));
//! ```

pub mod compile;
pub mod error;
pub mod facts;
pub mod rule;

pub use compile::{compile_group, CompiledFilter};
pub use error::RuleError;
pub use facts::ImageFacts;
pub use rule::{
    AlbumFilter, AspectFilter, DateFilter, DateOp, ExtensionFilter, GroupOp, NameFilter,
    PathFilter, Relation, RelationFilter, Rule, RuleGroup, SetMode, TagFilter,
};

//! # sb-sync
//!
//! The filesystem → catalogue sync pipeline.
//!
//! A run walks the configured roots and threads one [`WorkItem`] per file
//! through a linear chain of stages connected by bounded channels:
//!
//! walker → lookup → dirty → extract → filter → acl → persist → sink
//!
//! Each stage is one tokio task built by [`spawn_stage`] around a
//! [`Stage`] implementation. A shared `CancellationToken` stops every stage
//! when any of them hits a fatal error. [`run_sync`] wires the chain,
//! records the run in `sync_runs` and removes vanished files in full mode.

pub mod facts;
pub mod item;
pub mod mapper;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod stages;

pub use item::{FileFacts, WorkItem};
pub use orchestrator::{run_sync, SyncOptions};
pub use report::{SyncReport, SyncStats};
pub use stage::{spawn_sink, spawn_stage, Stage, CHANNEL_CAPACITY};

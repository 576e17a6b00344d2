//! Database query modules.

pub mod images;
pub mod sync_runs;
pub mod tags;

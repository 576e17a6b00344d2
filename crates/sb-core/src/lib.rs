//! sb-core: shared types, IDs, errors, the metadata model and configuration.
//!
//! This crate is the foundational dependency for the other sb-* crates,
//! providing type-safe identifiers, a unified error type, library-domain
//! enums, the typed metadata map produced by extraction, and the
//! configuration sections consumed by the sync pipeline.

pub mod config;
pub mod error;
pub mod ids;
pub mod library;
pub mod metadata;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use library::*;

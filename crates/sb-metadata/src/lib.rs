//! # sb-metadata
//!
//! Reads image metadata for the sync pipeline.
//!
//! - **Reader seam** ([`MetadataReader`]) -- what the pipeline's extractor
//!   stage calls; tests substitute their own implementation.
//! - **Exiftool backend** ([`ExiftoolReader`]) -- talks to one stay-open
//!   `exiftool` process ([`StayOpenExiftool`]), or shells out per file
//!   through [`ToolCommand`], and parses the grouped JSON output.
//! - **Field resolution** ([`resolve`]) -- maps raw `group:tag` values onto
//!   configured aliases with unit stripping and type coercion.

pub mod command;
pub mod exiftool;
pub mod raw;
pub mod reader;
pub mod resolve;
pub mod stay_open;

pub use command::{ToolCommand, ToolOutput};
pub use exiftool::ExiftoolReader;
pub use raw::{parse_exiftool_json, RawMetadata, RawValue};
pub use reader::MetadataReader;
pub use resolve::resolve;
pub use stay_open::StayOpenExiftool;

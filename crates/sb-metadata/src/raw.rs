//! Raw exiftool output.
//!
//! `exiftool -j -G1` prints a JSON array with one object per file whose keys
//! are `Group:Tag`. Keys are stored lowercased so configured references
//! match regardless of case.

use std::collections::BTreeMap;

use sb_core::{Error, Result};
use serde_json::Value;

/// One raw value and the group it was reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    pub value: Value,
    /// Lowercased group prefix, e.g. `exififd` or `xmp-dc`.
    pub namespace: String,
}

/// Raw values keyed by lowercased `group:tag`.
pub type RawMetadata = BTreeMap<String, RawValue>;

/// Parse the JSON exiftool printed for a single file.
pub fn parse_exiftool_json(json: &str) -> Result<RawMetadata> {
    let parsed: Vec<serde_json::Map<String, Value>> = serde_json::from_str(json)
        .map_err(|e| Error::Metadata(format!("exiftool JSON parse error: {e}")))?;

    let first = parsed
        .into_iter()
        .next()
        .ok_or_else(|| Error::Metadata("empty exiftool result".into()))?;

    Ok(first
        .into_iter()
        .map(|(key, value)| {
            let key = key.to_lowercase();
            let namespace = key.split(':').next().unwrap_or_default().to_string();
            (key, RawValue { value, namespace })
        })
        .collect())
}

//! Typed image metadata and the field mapping that produces it.
//!
//! Extraction resolves each configured field alias (for example
//! `focal_length`) from an ordered list of raw source references (for example
//! `exififd:FocalLength`) into a [`MetadataValue`]. The resulting
//! [`Metadata`] map keeps the winning source for every field.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const TAKEN_AT: &str = "taken_at";
pub const CAMERA: &str = "camera";
pub const MAKER: &str = "maker";
pub const LENS: &str = "lens";
pub const FOCAL_LENGTH: &str = "focal_length";
pub const APERTURE: &str = "aperture";
pub const ISO: &str = "iso";
pub const EXPOSURE_TIME: &str = "exposure_time";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ROTATION: &str = "rotation";
pub const RATING: &str = "rating";
pub const TITLE: &str = "title";
pub const SUBJECT: &str = "subject";
pub const TAGS: &str = "tags";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";

/// Target type a raw value is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    #[default]
    String,
    Int,
    Float,
    /// A fraction such as `1/500`, stored as a float.
    Rational,
    Bool,
    List,
    #[serde(alias = "date_time")]
    Datetime,
}

/// A coerced metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    DateTime(NaiveDateTime),
}

/// One resolved field together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataValue {
    /// Configured field alias (e.g. `focal_length`).
    pub alias: String,
    /// Raw source reference the value came from (e.g. `exififd:FocalLength`).
    #[serde(rename = "ref")]
    pub source: String,
    #[serde(rename = "type")]
    pub kind: MetadataType,
    pub value: MetaValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Resolved metadata of one image, keyed by field alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: MetadataValue) {
        self.fields.insert(value.alias.clone(), value);
    }

    pub fn get(&self, alias: &str) -> Option<&MetadataValue> {
        self.fields.get(alias)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataValue> {
        self.fields.values()
    }

    /// Overlay `other` onto `self`; fields present in both take `other`'s
    /// value.
    pub fn merge(&mut self, other: Metadata) {
        self.fields.extend(other.fields);
    }

    /// Serialize to the JSON stored alongside the image record.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Metadata(e.to_string()))
    }

    // -- typed accessors ----------------------------------------------------

    pub fn text(&self, alias: &str) -> Option<&str> {
        match &self.get(alias)?.value {
            MetaValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, alias: &str) -> Option<i64> {
        match self.get(alias)?.value {
            MetaValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn float(&self, alias: &str) -> Option<f64> {
        match self.get(alias)?.value {
            MetaValue::Float(f) => Some(f),
            MetaValue::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn list(&self, alias: &str) -> Option<&[String]> {
        match &self.get(alias)?.value {
            MetaValue::List(items) => Some(items.as_slice()),
            MetaValue::Text(s) => Some(std::slice::from_ref(s)),
            _ => None,
        }
    }

    pub fn datetime(&self, alias: &str) -> Option<NaiveDateTime> {
        match &self.get(alias)?.value {
            MetaValue::DateTime(t) => Some(*t),
            MetaValue::Text(s) => parse_exif_datetime(s),
            _ => None,
        }
    }

    // -- semantic accessors -------------------------------------------------

    pub fn taken_at(&self) -> Option<NaiveDateTime> {
        self.datetime(TAKEN_AT)
    }

    pub fn title(&self) -> Option<&str> {
        self.text(TITLE)
    }

    pub fn subject(&self) -> Option<&str> {
        self.text(SUBJECT)
    }

    pub fn lens(&self) -> Option<&str> {
        self.text(LENS)
    }

    /// `"<maker> <model>"`, or whichever half is known.
    pub fn maker_camera(&self) -> Option<String> {
        match (self.text(MAKER), self.text(CAMERA)) {
            (Some(maker), Some(model)) => Some(format!("{maker} {model}")),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        }
    }

    pub fn focal_length(&self) -> Option<f64> {
        self.float(FOCAL_LENGTH)
    }

    pub fn aperture(&self) -> Option<f64> {
        self.float(APERTURE)
    }

    pub fn iso(&self) -> Option<i64> {
        self.int(ISO)
    }

    /// Exposure time in seconds, accepting `"1/500"` or `"0.3"`.
    pub fn exposure(&self) -> Option<f64> {
        if let Some(f) = self.float(EXPOSURE_TIME) {
            return Some(f);
        }
        let raw = self.text(EXPOSURE_TIME)?;
        match parse_fraction(raw) {
            Some(v) => Some(v),
            None => {
                tracing::warn!(exposure = raw, "unparseable exposure time");
                None
            }
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinate(LATITUDE)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinate(LONGITUDE)
    }

    fn coordinate(&self, alias: &str) -> Option<f64> {
        if let Some(f) = self.float(alias) {
            return Some(f);
        }
        let raw = self.text(alias)?;
        match parse_dms(raw) {
            Some(v) => Some(v),
            None => {
                tracing::warn!(field = alias, value = raw, "unparseable coordinate");
                None
            }
        }
    }

    /// Clockwise rotation in degrees derived from the EXIF orientation text.
    pub fn rotation(&self) -> Option<i32> {
        if let Some(i) = self.int(ROTATION) {
            return Some(rotation_from_orientation_code(i));
        }
        self.text(ROTATION).map(rotation_from_orientation)
    }

    pub fn rating(&self) -> Option<i64> {
        self.int(RATING)
    }

    pub fn width(&self) -> Option<u32> {
        self.int(WIDTH).and_then(|w| u32::try_from(w).ok())
    }

    pub fn height(&self) -> Option<u32> {
        self.int(HEIGHT).and_then(|h| u32::try_from(h).ok())
    }

    /// Hierarchical tag paths, e.g. `"Travel/Iceland"`.
    ///
    /// Lightroom's `|` separator is normalized to `/`, and each path is
    /// reduced to the segments the stored tag tree keeps (see
    /// [`split_tag_path`]). Paths with no segments are dropped.
    pub fn tags(&self) -> Vec<String> {
        self.list(TAGS)
            .map(|tags| {
                tags.iter()
                    .map(|t| split_tag_path(&t.replace('|', "/")).join("/"))
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Value parsing helpers
// ---------------------------------------------------------------------------

/// Parse exiftool date/time text (`2024:03:31 23:59:59[.sss][+hh:mm]`).
///
/// Sub-seconds and zone suffixes are ignored; the wall-clock time is kept.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    let head = s.get(..19).unwrap_or(s);
    for fmt in ["%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(head, fmt) {
            return Some(t);
        }
    }
    let day = s.get(..10).unwrap_or(s);
    ["%Y:%m:%d", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `"0.15"` or `"1/500"`.
pub fn parse_fraction(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    s.parse().ok()
}

static DECIMAL_COORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^([+-]?\d+(?:\.\d+)?)\s*([NSEW])?$").ok());

static DMS_COORD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^([+-]?\d+(?:\.\d+)?)\s*(?:deg|°)?\s*(?:(\d+(?:\.\d+)?)\s*['’m]?\s*)?(?:(\d+(?:\.\d+)?)\s*(?:"|”|s)?\s*)?([NSEW])$"#,
    )
    .ok()
});

/// Parse a GPS coordinate into signed decimal degrees.
///
/// Accepts `47 deg 29' 22.64" N`, `47° 29' 22.64" N`, `47 29 22.64 N`,
/// `47.4896 N` and plain signed decimals. South and west are negative.
pub fn parse_dms(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    let s = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.is_empty() {
        return None;
    }

    let signed = |v: f64, hemi: Option<&str>| match hemi.map(str::to_ascii_uppercase).as_deref() {
        Some("S") | Some("W") => -v.abs(),
        Some(_) => v.abs(),
        None => v,
    };

    if let Some(caps) = DECIMAL_COORD.as_ref()?.captures(&s) {
        let v: f64 = caps[1].parse().ok()?;
        return Some(signed(v, caps.get(2).map(|m| m.as_str())));
    }

    let caps = DMS_COORD.as_ref()?.captures(&s)?;
    let deg: f64 = caps[1].parse().ok()?;
    let min: f64 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    let sec: f64 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    let v = deg.abs() + min / 60.0 + sec / 3600.0;
    Some(signed(v, caps.get(4).map(|m| m.as_str())))
}

/// Rotation in degrees for an EXIF orientation description. Mirrored and
/// unknown orientations map to 0.
pub fn rotation_from_orientation(raw: &str) -> i32 {
    match raw.trim().to_lowercase().as_str() {
        "rotate 90 cw" | "right-top" => 90,
        "rotate 180" | "bottom-right" => 180,
        "rotate 270 cw" | "left-bottom" => 270,
        _ => 0,
    }
}

/// Rotation for a numeric EXIF orientation (`-n` output).
fn rotation_from_orientation_code(code: i64) -> i32 {
    match code {
        6 => 90,
        3 => 180,
        8 => 270,
        _ => 0,
    }
}

/// Split a hierarchical tag path on `/`, trimming segments and dropping
/// empty ones.
pub fn split_tag_path(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Field configuration
// ---------------------------------------------------------------------------

/// How one metadata alias is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataFieldConfig {
    /// Raw references tried in order, e.g. `exififd:FocalLength`.
    pub sources: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: MetadataType,
    /// Unit suffix stripped from text values before coercion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl MetadataFieldConfig {
    fn of(kind: MetadataType, unit: Option<&str>, sources: &[&str]) -> Self {
        Self {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            kind,
            unit: unit.map(String::from),
        }
    }
}

/// Alias → field configuration. Ordered so its serialization is stable.
pub type MetadataFields = BTreeMap<String, MetadataFieldConfig>;

/// The built-in field mapping for exiftool `-G1` output.
pub fn default_fields() -> MetadataFields {
    use MetadataType as T;

    let fields = [
        (
            TAKEN_AT,
            MetadataFieldConfig::of(
                T::Datetime,
                None,
                &[
                    "composite:DateTimeCreated",
                    "xmp-exif:DateTimeOriginal",
                    "exififd:DateTimeOriginal",
                    "exififd:CreateDate",
                    "exif:DateTimeOriginal",
                    "exif:CreateDate",
                ],
            ),
        ),
        (CAMERA, MetadataFieldConfig::of(T::String, None, &["ifd0:Model", "exif:Model"])),
        (MAKER, MetadataFieldConfig::of(T::String, None, &["ifd0:Make"])),
        (
            LENS,
            MetadataFieldConfig::of(
                T::String,
                None,
                &[
                    "composite:LensID",
                    "exififd:LensModel",
                    "exififd:LensInfo",
                    "xmp-aux:Lens",
                ],
            ),
        ),
        (
            FOCAL_LENGTH,
            MetadataFieldConfig::of(T::Float, Some("mm"), &["exififd:FocalLength"]),
        ),
        (
            APERTURE,
            MetadataFieldConfig::of(
                T::Float,
                Some("f"),
                &["composite:Aperture", "exififd:FNumber", "exififd:ApertureValue"],
            ),
        ),
        (
            ISO,
            MetadataFieldConfig::of(T::Int, Some("ISO"), &["exififd:ISO", "exif:ISO"]),
        ),
        (
            EXPOSURE_TIME,
            MetadataFieldConfig::of(
                T::String,
                Some("s"),
                &["composite:ShutterSpeed", "exififd:ExposureTime"],
            ),
        ),
        (
            LATITUDE,
            MetadataFieldConfig::of(T::String, None, &["composite:GPSLatitude", "exif:GPSLatitude"]),
        ),
        (
            LONGITUDE,
            MetadataFieldConfig::of(
                T::String,
                None,
                &["composite:GPSLongitude", "exif:GPSLongitude"],
            ),
        ),
        (
            ROTATION,
            MetadataFieldConfig::of(T::String, None, &["ifd0:Orientation", "exif:Orientation"]),
        ),
        (RATING, MetadataFieldConfig::of(T::Int, None, &["xmp-xmp:Rating"])),
        (
            TITLE,
            MetadataFieldConfig::of(T::String, None, &["xmp-dc:Title", "iptc:ObjectName"]),
        ),
        (
            SUBJECT,
            MetadataFieldConfig::of(T::String, None, &["xmp-dc:Description", "iptc:Caption"]),
        ),
        (
            TAGS,
            MetadataFieldConfig::of(
                T::List,
                None,
                &[
                    "xmp-digikam:TagsList",
                    "xmp-lr:HierarchicalSubject",
                    "iptc:Keywords",
                    "xmp-dc:Subject",
                ],
            ),
        ),
        (
            HEIGHT,
            MetadataFieldConfig::of(
                T::Int,
                None,
                &["file:ImageHeight", "xmp-tiff:ImageHeight", "exif:PixelYDimension"],
            ),
        ),
        (
            WIDTH,
            MetadataFieldConfig::of(
                T::Int,
                None,
                &["file:ImageWidth", "xmp-tiff:ImageWidth", "exif:PixelXDimension"],
            ),
        ),
    ];

    fields
        .into_iter()
        .map(|(alias, cfg)| (alias.to_string(), cfg))
        .collect()
}

/// Overlay user-configured fields onto the defaults, alias by alias.
pub fn merge_fields(user: &MetadataFields) -> MetadataFields {
    let mut merged = default_fields();
    merged.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// SHA-256 (hex) of the canonical JSON form of a field mapping.
///
/// Stored on every sync run; a change forces all images to be re-extracted.
pub fn schema_hash(fields: &MetadataFields) -> Result<String> {
    let canonical = serde_json::to_vec(fields).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

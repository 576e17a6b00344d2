//! Maps raw exiftool values onto configured metadata aliases.
//!
//! For every alias the configured sources are tried in order. The first
//! source that is present, meaningful and coercible to the field type wins;
//! a value that fails coercion falls through to the next source.

use sb_core::metadata::{
    parse_exif_datetime, parse_fraction, MetaValue, Metadata, MetadataFieldConfig, MetadataFields,
    MetadataType, MetadataValue,
};
use serde_json::Value;

use crate::raw::RawMetadata;

/// Resolve every configured field against one file's raw values.
pub fn resolve(raw: &RawMetadata, fields: &MetadataFields) -> Metadata {
    let mut out = Metadata::new();
    for (alias, field) in fields {
        if let Some(value) = resolve_field(alias, field, raw) {
            out.insert(value);
        }
    }
    out
}

fn resolve_field(alias: &str, field: &MetadataFieldConfig, raw: &RawMetadata) -> Option<MetadataValue> {
    for source in &field.sources {
        let Some(rm) = raw.get(&source.to_lowercase()) else {
            continue;
        };
        if !is_meaningful(&rm.value) {
            continue;
        }

        let mut value = rm.value.clone();
        if let (Some(unit), Value::String(s)) = (&field.unit, &rm.value) {
            let stripped = strip_unit(s, unit);
            if !stripped.is_empty() {
                value = Value::String(stripped.to_string());
            }
        }

        match coerce(&value, field.kind) {
            Some(coerced) => {
                return Some(MetadataValue {
                    alias: alias.to_string(),
                    source: source.clone(),
                    kind: field.kind,
                    value: coerced,
                    unit: field.unit.clone(),
                });
            }
            None => {
                tracing::trace!(alias, source = %source, value = %value, kind = ?field.kind, "type coercion failed");
            }
        }
    }
    None
}

fn is_meaningful(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Remove a trailing unit, case-insensitively, with or without a space:
/// `"48.0 mm"` and `"48.0mm"` both become `"48.0"`.
pub fn strip_unit<'a>(value: &'a str, unit: &str) -> &'a str {
    let v = value.trim();
    let u = unit.trim();
    if u.is_empty() || v.len() < u.len() {
        return v;
    }
    let split = v.len() - u.len();
    match (v.get(..split), v.get(split..)) {
        (Some(head), Some(tail)) if tail.eq_ignore_ascii_case(u) => head.trim_end(),
        _ => v,
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a raw JSON value to a metadata type, or `None` if it does not fit.
pub fn coerce(v: &Value, kind: MetadataType) -> Option<MetaValue> {
    match kind {
        MetadataType::String => match v {
            Value::Array(items) => Some(MetaValue::Text(
                items
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
            other => scalar_text(other).map(MetaValue::Text),
        },
        MetadataType::Int => match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(MetaValue::Int),
            Value::String(s) => s.trim().parse().ok().map(MetaValue::Int),
            _ => None,
        },
        MetadataType::Float => match v {
            Value::Number(n) => n.as_f64().map(MetaValue::Float),
            Value::String(s) => s.trim().parse().ok().map(MetaValue::Float),
            _ => None,
        },
        MetadataType::Rational => match v {
            Value::Number(n) => n.as_f64().map(MetaValue::Float),
            Value::String(s) => parse_fraction(s).map(MetaValue::Float),
            _ => None,
        },
        MetadataType::Bool => match v {
            Value::Bool(b) => Some(MetaValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| MetaValue::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(MetaValue::Bool(true)),
                "false" | "no" | "0" => Some(MetaValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        MetadataType::List => match v {
            Value::Array(items) => Some(MetaValue::List(
                items.iter().filter_map(scalar_text).collect(),
            )),
            other => scalar_text(other).map(|s| MetaValue::List(vec![s])),
        },
        MetadataType::Datetime => match v {
            Value::String(s) => parse_exif_datetime(s).map(MetaValue::DateTime),
            _ => None,
        },
    }
}

//! Rule AST and its configuration format.
//!
//! Every rule is an object tagged with `"type"`:
//!
//! ```json
//! { "type": "tag",       "mode": "any", "tags": ["Travel"] }
//! { "type": "date",      "op": "on", "date": "2024.03" }
//! { "type": "name",      "pattern": "IMG_*.jpg" }
//! { "type": "rating",    "op": ">", "value": 3 }
//! { "type": "path",      "mode": "none", "paths": ["private"] }
//! { "type": "extension", "mode": "any", "extensions": ["jpg", "heic"] }
//! { "type": "width",     "op": ">", "value": 4000 }
//! { "type": "aspect",    "op": ">", "value": 2.0 }
//! { "type": "group",     "op": "any", "rules": [ ... ] }
//! ```
//!
//! `Deserialize` is implemented by hand: the entry is first read as a
//! [`serde_json::Value`], the discriminator is inspected, and the remaining
//! fields are decoded into the matching typed struct. The same code path
//! serves JSON and TOML sources.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::RuleError;

/// Boolean combinator of a [`RuleGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOp {
    /// Every rule must match.
    #[serde(alias = "and")]
    All,
    /// At least one rule must match.
    #[serde(alias = "or")]
    Any,
}

/// Set semantics used by tag, path, extension and album rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetMode {
    Any,
    All,
    None,
    Only,
}

/// Comparison of a date rule against its `[start, end)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOp {
    On,
    Before,
    After,
}

/// Relational operator for numeric rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "<", alias = "lt")]
    Below,
    #[serde(rename = ">", alias = "gt")]
    Above,
}

impl Relation {
    /// Compare `fact` against `value`.
    pub fn holds<T: PartialOrd>(self, fact: T, value: T) -> bool {
        match self {
            Relation::Below => fact < value,
            Relation::Above => fact > value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagFilter {
    #[serde(alias = "op")]
    pub mode: SetMode,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateFilter {
    pub op: DateOp,
    /// `yyyy`, `yyyy.mm` or `yyyy.mm.dd`.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameFilter {
    pub pattern: String,
}

/// Integer comparison shared by the rating, width and height rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationFilter {
    pub op: Relation,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectFilter {
    pub op: Relation,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathFilter {
    pub mode: SetMode,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionFilter {
    pub mode: SetMode,
    pub extensions: Vec<String>,
}

/// Album membership. Only meaningful where album context is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlbumFilter {
    pub mode: SetMode,
    pub albums: Vec<u64>,
    #[serde(default)]
    pub include_children: bool,
    #[serde(default)]
    pub exclude_children: bool,
}

/// A single entry of a [`RuleGroup`].
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Tag(TagFilter),
    Date(DateFilter),
    Name(NameFilter),
    Rating(RelationFilter),
    Path(PathFilter),
    Extension(ExtensionFilter),
    Width(RelationFilter),
    Height(RelationFilter),
    Aspect(AspectFilter),
    Album(AlbumFilter),
    NotInChildAlbums,
    /// A nested group.
    Group(RuleGroup),
}

impl Rule {
    /// The `type` discriminator this rule is written with.
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Tag(_) => "tag",
            Rule::Date(_) => "date",
            Rule::Name(_) => "name",
            Rule::Rating(_) => "rating",
            Rule::Path(_) => "path",
            Rule::Extension(_) => "extension",
            Rule::Width(_) => "width",
            Rule::Height(_) => "height",
            Rule::Aspect(_) => "aspect",
            Rule::Album(_) => "album",
            Rule::NotInChildAlbums => "notchildren",
            Rule::Group(_) => "group",
        }
    }
}

/// `all` / `any` over a list of rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleGroup {
    pub op: GroupOp,
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn new(op: GroupOp, rules: Vec<Rule>) -> Self {
        Self { op, rules }
    }

    /// Decode a group from an already-parsed value.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        group_from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Two-pass decode
// ---------------------------------------------------------------------------

fn group_from_value(value: &Value) -> Result<RuleGroup, RuleError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RuleError::InvalidGroup("expected an object".into()))?;

    let op = obj
        .get("op")
        .ok_or_else(|| RuleError::InvalidGroup("missing \"op\"".into()))?;
    let op: GroupOp = serde_json::from_value(op.clone())
        .map_err(|e| RuleError::InvalidGroup(format!("op: {e}")))?;

    let rules = obj
        .get("rules")
        .and_then(Value::as_array)
        .ok_or_else(|| RuleError::InvalidGroup("missing \"rules\" array".into()))?
        .iter()
        .enumerate()
        .map(|(index, entry)| rule_from_value(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleGroup { op, rules })
}

fn rule_from_value(index: usize, value: &Value) -> Result<Rule, RuleError> {
    let obj = value.as_object().ok_or(RuleError::MissingType { index })?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or(RuleError::MissingType { index })?;

    let mut body = obj.clone();
    body.remove("type");
    let body = Value::Object(body);

    let rule = match kind {
        "tag" => Rule::Tag(typed(index, kind, body)?),
        "date" => Rule::Date(typed(index, kind, body)?),
        "name" => Rule::Name(typed(index, kind, body)?),
        "rating" => Rule::Rating(typed(index, kind, body)?),
        "path" => Rule::Path(typed(index, kind, body)?),
        "extension" => Rule::Extension(typed(index, kind, body)?),
        "width" => Rule::Width(typed(index, kind, body)?),
        "height" => Rule::Height(typed(index, kind, body)?),
        "aspect" => Rule::Aspect(typed(index, kind, body)?),
        "album" => Rule::Album(typed(index, kind, body)?),
        "notchildren" | "not_in_child_albums" => Rule::NotInChildAlbums,
        "group" => Rule::Group(group_from_value(&body).map_err(|e| RuleError::InvalidRule {
            index,
            kind: kind.to_string(),
            message: e.to_string(),
        })?),
        other => {
            return Err(RuleError::UnknownType {
                index,
                kind: other.to_string(),
            })
        }
    };
    Ok(rule)
}

fn typed<T: DeserializeOwned>(index: usize, kind: &str, body: Value) -> Result<T, RuleError> {
    serde_json::from_value(body).map_err(|e| RuleError::InvalidRule {
        index,
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn group_to_value(group: &RuleGroup) -> Result<Value, serde_json::Error> {
    let rules = group
        .rules
        .iter()
        .map(rule_to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let mut map = Map::new();
    map.insert("op".into(), serde_json::to_value(group.op)?);
    map.insert("rules".into(), Value::Array(rules));
    Ok(Value::Object(map))
}

fn rule_to_value(rule: &Rule) -> Result<Value, serde_json::Error> {
    let mut value = match rule {
        Rule::Tag(f) => serde_json::to_value(f)?,
        Rule::Date(f) => serde_json::to_value(f)?,
        Rule::Name(f) => serde_json::to_value(f)?,
        Rule::Rating(f) | Rule::Width(f) | Rule::Height(f) => serde_json::to_value(f)?,
        Rule::Path(f) => serde_json::to_value(f)?,
        Rule::Extension(f) => serde_json::to_value(f)?,
        Rule::Aspect(f) => serde_json::to_value(f)?,
        Rule::Album(f) => serde_json::to_value(f)?,
        Rule::NotInChildAlbums => Value::Object(Map::new()),
        Rule::Group(g) => group_to_value(g)?,
    };
    if let Value::Object(map) = &mut value {
        map.insert("type".into(), Value::String(rule.kind().to_string()));
    }
    Ok(value)
}

impl Serialize for RuleGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        group_to_value(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        group_from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn decodes_every_atomic_kind() {
        let group = RuleGroup::from_value(&json!({
            "op": "any",
            "rules": [
                { "type": "tag", "op": "only", "tags": ["Travel"] },
                { "type": "date", "op": "before", "date": "2020" },
                { "type": "name", "pattern": "IMG_*" },
                { "type": "rating", "op": ">", "value": 3 },
                { "type": "path", "mode": "none", "paths": ["private"] },
                { "type": "extension", "mode": "any", "extensions": ["JPG"] },
                { "type": "width", "op": "<", "value": 100 },
                { "type": "height", "op": "gt", "value": 100 },
                { "type": "aspect", "op": ">", "value": 2.5 },
                { "type": "album", "mode": "any", "albums": [1, 2] },
                { "type": "notchildren" }
            ]
        }))
        .unwrap();

        assert_eq!(group.op, GroupOp::Any);
        let kinds: Vec<_> = group.rules.iter().map(Rule::kind).collect();
        assert_eq!(
            kinds,
            [
                "tag",
                "date",
                "name",
                "rating",
                "path",
                "extension",
                "width",
                "height",
                "aspect",
                "album",
                "notchildren"
            ]
        );
        assert_matches!(
            &group.rules[0],
            Rule::Tag(TagFilter { mode: SetMode::Only, tags }) if tags == &["Travel"]
        );
        assert_matches!(
            &group.rules[7],
            Rule::Height(RelationFilter { op: Relation::Above, value: 100 })
        );
    }

    #[test]
    fn decodes_nested_group() {
        let group = RuleGroup::from_value(&json!({
            "op": "and",
            "rules": [
                { "type": "group", "op": "or", "rules": [
                    { "type": "name", "pattern": "*.jpg" }
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(group.op, GroupOp::All);
        assert_matches!(&group.rules[0], Rule::Group(inner) if inner.op == GroupOp::Any);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = RuleGroup::from_value(&json!({
            "op": "all",
            "rules": [ { "type": "colour", "value": "red" } ]
        }))
        .unwrap_err();
        assert_matches!(err, RuleError::UnknownType { index: 0, ref kind } if kind == "colour");
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = RuleGroup::from_value(&json!({
            "op": "all",
            "rules": [ { "type": "name", "pattern": "a" }, { "pattern": "b" } ]
        }))
        .unwrap_err();
        assert_matches!(err, RuleError::MissingType { index: 1 });
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = RuleGroup::from_value(&json!({
            "op": "all",
            "rules": [ { "type": "rating", "op": ">=", "value": 3 } ]
        }))
        .unwrap_err();
        assert_matches!(err, RuleError::InvalidRule { index: 0, .. });

        let err = RuleGroup::from_value(&json!({ "op": "xor", "rules": [] })).unwrap_err();
        assert_matches!(err, RuleError::InvalidGroup(_));
    }

    #[test]
    fn stray_field_is_rejected() {
        let err = RuleGroup::from_value(&json!({
            "op": "all",
            "rules": [ { "type": "name", "pattern": "a", "patern": "b" } ]
        }))
        .unwrap_err();
        assert_matches!(err, RuleError::InvalidRule { .. });
    }

    #[test]
    fn decodes_from_toml() {
        let group: RuleGroup = toml::from_str(
            r#"
            op = "all"

            [[rules]]
            type = "tag"
            mode = "none"
            tags = ["Private"]

            [[rules]]
            type = "rating"
            op = ">"
            value = 2
            "#,
        )
        .unwrap();

        assert_eq!(group.rules.len(), 2);
        assert_matches!(&group.rules[1], Rule::Rating(RelationFilter { value: 2, .. }));
    }

    #[test]
    fn serializes_with_discriminator() {
        let group = RuleGroup::new(
            GroupOp::All,
            vec![
                Rule::Name(NameFilter {
                    pattern: "*.jpg".into(),
                }),
                Rule::NotInChildAlbums,
            ],
        );
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["op"], "all");
        assert_eq!(value["rules"][0]["type"], "name");
        assert_eq!(value["rules"][0]["pattern"], "*.jpg");
        assert_eq!(value["rules"][1]["type"], "notchildren");
    }
}

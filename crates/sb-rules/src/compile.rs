//! Compilation of rule groups into reusable predicates.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Months, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::RuleError;
use crate::facts::ImageFacts;
use crate::rule::{
    AspectFilter, DateFilter, DateOp, ExtensionFilter, GroupOp, NameFilter, PathFilter,
    RelationFilter, Rule, RuleGroup, SetMode, TagFilter,
};

type Predicate = dyn Fn(&ImageFacts) -> bool + Send + Sync;

/// A compiled rule group.
///
/// Cheap to clone and safe to share between tasks; evaluation never mutates
/// anything.
#[derive(Clone)]
pub struct CompiledFilter {
    pred: Arc<Predicate>,
}

impl CompiledFilter {
    fn new(pred: impl Fn(&ImageFacts) -> bool + Send + Sync + 'static) -> Self {
        Self {
            pred: Arc::new(pred),
        }
    }

    /// Evaluate against one image.
    pub fn matches(&self, facts: &ImageFacts) -> bool {
        (self.pred)(facts)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter").finish_non_exhaustive()
    }
}

impl RuleGroup {
    /// Compile this group for evaluation against [`ImageFacts`].
    pub fn compile(&self) -> Result<CompiledFilter, RuleError> {
        compile_group(self)
    }
}

/// Compile a group and all of its nested groups.
///
/// Fails on the first rule that cannot be compiled; no partial group is ever
/// returned.
pub fn compile_group(group: &RuleGroup) -> Result<CompiledFilter, RuleError> {
    if group.rules.is_empty() {
        return Err(RuleError::EmptyGroup);
    }

    let preds = group
        .rules
        .iter()
        .map(compile_rule)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match group.op {
        GroupOp::All => CompiledFilter::new(move |facts| preds.iter().all(|p| p.matches(facts))),
        GroupOp::Any => CompiledFilter::new(move |facts| preds.iter().any(|p| p.matches(facts))),
    })
}

fn compile_rule(rule: &Rule) -> Result<CompiledFilter, RuleError> {
    match rule {
        Rule::Tag(f) => compile_tag(f),
        Rule::Date(f) => compile_date(f),
        Rule::Name(f) => compile_name(f),
        Rule::Rating(f) => Ok(compile_rating(f)),
        Rule::Path(f) => compile_path(f),
        Rule::Extension(f) => Ok(compile_extension(f)),
        Rule::Width(f) => {
            let RelationFilter { op, value } = *f;
            Ok(CompiledFilter::new(move |facts| {
                op.holds(i64::from(facts.width), value)
            }))
        }
        Rule::Height(f) => {
            let RelationFilter { op, value } = *f;
            Ok(CompiledFilter::new(move |facts| {
                op.holds(i64::from(facts.height), value)
            }))
        }
        Rule::Aspect(f) => Ok(compile_aspect(f)),
        Rule::Album(_) => Err(RuleError::NotImageEvaluable("album")),
        Rule::NotInChildAlbums => Err(RuleError::NotImageEvaluable("notchildren")),
        Rule::Group(g) => compile_group(g),
    }
}

/// `tag` equals `wanted` or lies below it in the hierarchy.
fn tag_matches(tag: &str, wanted: &str) -> bool {
    match tag.strip_prefix(wanted) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

fn compile_tag(f: &TagFilter) -> Result<CompiledFilter, RuleError> {
    if f.tags.is_empty() {
        return Err(RuleError::EmptyTags);
    }
    let wanted = f.tags.clone();
    let mode = f.mode;

    Ok(CompiledFilter::new(move |facts| {
        let hits = wanted
            .iter()
            .filter(|w| facts.tags.iter().any(|t| tag_matches(t, w)))
            .count();
        match mode {
            SetMode::Any => hits > 0,
            SetMode::All => hits == wanted.len(),
            SetMode::None => hits == 0,
            SetMode::Only => {
                !facts.tags.is_empty()
                    && facts
                        .tags
                        .iter()
                        .all(|t| wanted.iter().any(|w| tag_matches(t, w)))
            }
        }
    }))
}

/// Expand `yyyy[.mm[.dd]]` to the half-open range it covers.
fn date_range(text: &str) -> Result<(NaiveDateTime, NaiveDateTime), RuleError> {
    let invalid = |message: &str| RuleError::InvalidDate {
        date: text.to_string(),
        message: message.to_string(),
    };

    let parts: Vec<&str> = text.trim().split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid("expected yyyy[.mm[.dd]]"));
    }
    let year: i32 = parts[0].parse().map_err(|_| invalid("bad year"))?;
    let month: u32 = match parts.get(1) {
        Some(m) => m.parse().map_err(|_| invalid("bad month"))?,
        None => 1,
    };
    let day: u32 = match parts.get(2) {
        Some(d) => d.parse().map_err(|_| invalid("bad day"))?,
        None => 1,
    };

    let start = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid("no such day"))?;
    let end = match parts.len() {
        1 => start.checked_add_months(Months::new(12)),
        2 => start.checked_add_months(Months::new(1)),
        _ => start.succ_opt(),
    }
    .ok_or_else(|| invalid("out of range"))?;

    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).ok_or_else(|| invalid("out of range"));
    Ok((midnight(start)?, midnight(end)?))
}

fn compile_date(f: &DateFilter) -> Result<CompiledFilter, RuleError> {
    let (start, end) = date_range(&f.date)?;
    let op = f.op;

    Ok(CompiledFilter::new(move |facts| {
        let Some(t) = facts.taken_at else {
            return false;
        };
        match op {
            DateOp::On => start <= t && t < end,
            DateOp::Before => t < start,
            DateOp::After => t >= end,
        }
    }))
}

/// Translate a `*` / `?` glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

fn compile_name(f: &NameFilter) -> Result<CompiledFilter, RuleError> {
    let re = glob_to_regex(&f.pattern).map_err(|source| RuleError::InvalidPattern {
        pattern: f.pattern.clone(),
        source,
    })?;
    Ok(CompiledFilter::new(move |facts| re.is_match(&facts.filename)))
}

fn compile_rating(f: &RelationFilter) -> CompiledFilter {
    let RelationFilter { op, value } = *f;
    CompiledFilter::new(move |facts| op.holds(facts.rating.unwrap_or(0), value))
}

fn compile_aspect(f: &AspectFilter) -> CompiledFilter {
    let AspectFilter { op, value } = *f;
    CompiledFilter::new(move |facts| match facts.aspect() {
        Some(ratio) => op.holds(ratio, value),
        None => false,
    })
}

/// Membership result for single-valued facts: `only` and `all` collapse to
/// `any`.
fn single_valued(mode: SetMode, member: bool) -> bool {
    match mode {
        SetMode::Any | SetMode::All | SetMode::Only => member,
        SetMode::None => !member,
    }
}

fn compile_path(f: &PathFilter) -> Result<CompiledFilter, RuleError> {
    if f.paths.is_empty() {
        return Err(RuleError::EmptyPaths);
    }
    let prefixes = f.paths.clone();
    let mode = f.mode;

    Ok(CompiledFilter::new(move |facts| {
        let member = prefixes.iter().any(|p| facts.path.starts_with(p.as_str()));
        single_valued(mode, member)
    }))
}

fn compile_extension(f: &ExtensionFilter) -> CompiledFilter {
    let set: HashSet<String> = f
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();
    let mode = f.mode;

    CompiledFilter::new(move |facts| {
        let member = set.contains(&facts.ext.to_lowercase());
        single_valued(mode, member)
    })
}

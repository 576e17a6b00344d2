//! Errors raised while decoding or compiling rule groups.

/// Failure to decode or compile a [`RuleGroup`](crate::RuleGroup).
///
/// Every variant is a configuration error: a group that fails here is never
/// evaluated in a degraded form.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The group itself is malformed (not an object, bad `op`, no `rules`).
    #[error("invalid rule group: {0}")]
    InvalidGroup(String),

    /// A rule entry has no `type` discriminator.
    #[error("rules[{index}]: missing type")]
    MissingType { index: usize },

    /// A rule entry names a type the DSL does not know.
    #[error("rules[{index}]: unknown rule type {kind:?}")]
    UnknownType { index: usize, kind: String },

    /// A rule entry has the right type but its fields do not decode.
    #[error("rules[{index}] ({kind}): {message}")]
    InvalidRule {
        index: usize,
        kind: String,
        message: String,
    },

    /// A group without any rules.
    #[error("empty rule group")]
    EmptyGroup,

    /// A rule that needs album context was used against plain image facts.
    #[error("{0} rule is not evaluable against image facts")]
    NotImageEvaluable(&'static str),

    /// A tag rule without tags.
    #[error("tag rule without tags")]
    EmptyTags,

    /// A path rule without paths.
    #[error("path rule without paths")]
    EmptyPaths,

    /// A date string that is not `yyyy[.mm[.dd]]` or names a non-existent day.
    #[error("invalid date {date:?}: {message}")]
    InvalidDate { date: String, message: String },

    /// A name glob that could not be turned into a regex.
    #[error("invalid name pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_display() {
        let err = RuleError::UnknownType {
            index: 2,
            kind: "colour".into(),
        };
        assert_eq!(err.to_string(), "rules[2]: unknown rule type \"colour\"");
    }

    #[test]
    fn not_image_evaluable_display() {
        let err = RuleError::NotImageEvaluable("album");
        assert_eq!(
            err.to_string(),
            "album rule is not evaluable against image facts"
        );
    }
}

//! The fact projection rules are evaluated against.

use chrono::NaiveDateTime;

/// Minimal view of an image needed to evaluate rules.
///
/// `path` is the directory relative to the library root (no trailing `/`),
/// `filename` includes the extension and `ext` is lowercase without the dot.
/// Tags are hierarchical paths such as `"Travel/Iceland/Winter"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageFacts {
    pub path: String,
    pub filename: String,
    pub ext: String,
    pub taken_at: Option<NaiveDateTime>,
    pub rating: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub tags: Vec<String>,
}

impl ImageFacts {
    /// Width divided by height, or `None` for a zero height.
    pub fn aspect(&self) -> Option<f64> {
        if self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_of_landscape() {
        let facts = ImageFacts {
            width: 3000,
            height: 1000,
            ..Default::default()
        };
        assert_eq!(facts.aspect(), Some(3.0));
    }

    #[test]
    fn aspect_without_height() {
        let facts = ImageFacts {
            width: 3000,
            ..Default::default()
        };
        assert_eq!(facts.aspect(), None);
    }
}

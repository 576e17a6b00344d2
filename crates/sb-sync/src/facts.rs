//! Projection of a work item onto the facts rules are evaluated against.

use sb_rules::ImageFacts;

use crate::item::WorkItem;

/// Facts for rule evaluation.
///
/// Items with freshly extracted metadata are judged by it; clean items are
/// judged by their stored record and its tags.
pub fn project(item: &WorkItem) -> ImageFacts {
    let mut facts = ImageFacts {
        path: item.path().to_string(),
        filename: item.filename().to_string(),
        ext: item.ext().to_string(),
        ..Default::default()
    };

    if let Some(md) = item.metadata() {
        facts.taken_at = md.taken_at();
        facts.rating = md.rating();
        facts.width = md.width().unwrap_or(0);
        facts.height = md.height().unwrap_or(0);
        facts.tags = md.tags();
    } else if let Some(rec) = item.record() {
        facts.taken_at = rec.taken_at;
        facts.rating = rec.rating;
        facts.width = rec.width;
        facts.height = rec.height;
        facts.tags = item.prior_tags().to_vec();
    }
    facts
}

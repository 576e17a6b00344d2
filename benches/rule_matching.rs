//! Benchmarks for rule matching
//!
//! Measures compiled-filter evaluation against image facts, the hot path of
//! the filter, panorama and ACL stages.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sb_rules::{CompiledFilter, ImageFacts, RuleGroup};
use serde_json::json;

fn compile(value: serde_json::Value) -> CompiledFilter {
    RuleGroup::from_value(&value).unwrap().compile().unwrap()
}

/// A landscape holiday photo with a handful of tags.
fn travel_photo() -> ImageFacts {
    ImageFacts {
        path: "2024/iceland".into(),
        filename: "IMG_0421.jpg".into(),
        ext: "jpg".into(),
        taken_at: NaiveDate::from_ymd_opt(2024, 3, 14).and_then(|d| d.and_hms_opt(16, 20, 0)),
        rating: Some(4),
        width: 6000,
        height: 4000,
        tags: vec![
            "Travel/Iceland/Skogafoss".into(),
            "Nature/Waterfall".into(),
            "People/Anna".into(),
        ],
    }
}

/// A wide panorama from a phone.
fn panorama() -> ImageFacts {
    ImageFacts {
        path: "phone/2023".into(),
        filename: "PANO_20230801.heic".into(),
        ext: "heic".into(),
        taken_at: NaiveDate::from_ymd_opt(2023, 8, 1).and_then(|d| d.and_hms_opt(9, 0, 0)),
        rating: None,
        width: 12000,
        height: 3000,
        tags: Vec::new(),
    }
}

fn tag_rule() -> CompiledFilter {
    compile(json!({
        "op": "all",
        "rules": [{"type": "tag", "mode": "any", "tags": ["Travel"]}]
    }))
}

fn complex_rule() -> CompiledFilter {
    compile(json!({
        "op": "all",
        "rules": [
            {"type": "date", "op": "on", "date": "2024.03"},
            {"type": "rating", "op": ">", "value": 3},
            {"type": "group", "op": "any", "rules": [
                {"type": "name", "pattern": "IMG_*"},
                {"type": "extension", "mode": "any", "extensions": ["jpg", "heic"]}
            ]},
            {"type": "tag", "mode": "none", "tags": ["Private"]}
        ]
    }))
}

fn bench_single_rule_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_rule_matching");

    let travel = travel_photo();
    let pano = panorama();
    let tag = tag_rule();
    let complex = complex_rule();
    let aspect = compile(json!({
        "op": "all",
        "rules": [{"type": "aspect", "op": ">", "value": 2.5}]
    }));

    group.bench_function("tag_match/hit", |b| {
        b.iter(|| tag.matches(black_box(&travel)))
    });
    group.bench_function("tag_match/miss", |b| {
        b.iter(|| tag.matches(black_box(&pano)))
    });
    group.bench_function("aspect/hit", |b| {
        b.iter(|| aspect.matches(black_box(&pano)))
    });
    group.bench_function("complex_rule/hit", |b| {
        b.iter(|| complex.matches(black_box(&travel)))
    });
    group.bench_function("complex_rule/miss", |b| {
        b.iter(|| complex.matches(black_box(&pano)))
    });

    group.finish();
}

/// First-match evaluation over an ordered ACL-style rule list.
fn bench_first_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_matching_rule");
    let travel = travel_photo();

    for count in [5usize, 20, 100] {
        // Only the last rule matches, so every rule is evaluated.
        let mut rules: Vec<CompiledFilter> = (0..count - 1)
            .map(|i| {
                compile(json!({
                    "op": "all",
                    "rules": [{"type": "path", "mode": "any", "paths": [format!("albums/{i}")]}]
                }))
            })
            .collect();
        rules.push(tag_rule());

        group.bench_with_input(BenchmarkId::new("rules", count), &rules, |b, rules| {
            b.iter(|| rules.iter().position(|r| r.matches(black_box(&travel))))
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let value = json!({
        "op": "any",
        "rules": [
            {"type": "name", "pattern": "DSC_*.jpg"},
            {"type": "date", "op": "before", "date": "2020.01.01"},
            {"type": "tag", "mode": "only", "tags": ["Family", "Home"]}
        ]
    });
    c.bench_function("compile_group", |b| {
        b.iter(|| {
            RuleGroup::from_value(black_box(&value))
                .unwrap()
                .compile()
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_single_rule_matching,
    bench_first_match,
    bench_compile
);
criterion_main!(benches);

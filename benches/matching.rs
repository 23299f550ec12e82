//! Benchmarks for the pattern matcher and the phonological substrate.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use soundlaw::prelude::*;
use soundlaw::matcher::pattern_width;

fn bench_matching(c: &mut Criterion) {
    let system = get_system(None).unwrap();
    let word = parse_sequence("# s t r a p a t i k u s #", system.as_ref());

    let concrete = parse_rule("p a > b a", system.as_ref()).unwrap();
    c.bench_function("match/concrete_pair", |b| {
        b.iter(|| {
            let opts = MatchOptions::new(system.as_ref(), 5);
            match_pattern(black_box(&word), black_box(&concrete.ante), &opts)
        })
    });

    let class = parse_rule("C V > V C", system.as_ref()).unwrap();
    c.bench_function("match/class_pair", |b| {
        b.iter(|| {
            let opts = MatchOptions::new(system.as_ref(), 5);
            match_pattern(black_box(&word), black_box(&class.ante), &opts)
        })
    });

    let quantified = parse_rule("C+ V > V", system.as_ref()).unwrap();
    c.bench_function("match/quantified_backtracking", |b| {
        b.iter(|| {
            let opts = MatchOptions::new(system.as_ref(), 1);
            match_pattern(black_box(&word), black_box(&quantified.ante), &opts)
        })
    });
    c.bench_function("match/pattern_width", |b| {
        b.iter(|| pattern_width(black_box(&quantified.ante)))
    });
}

fn bench_substrate(c: &mut Criterion) {
    let system = get_system(None).unwrap();

    c.bench_function("substrate/grapheme_lookup", |b| {
        b.iter(|| system.grapheme_to_features(black_box("t")))
    });

    let voiced = system
        .add_features(
            &system.grapheme_to_features("t").unwrap(),
            &FeatureSet::from_names(["voiced"]),
        );
    c.bench_function("substrate/features_to_grapheme", |b| {
        b.iter(|| system.features_to_grapheme(black_box(&voiced)))
    });

    c.bench_function("substrate/sound_distance", |b| {
        b.iter(|| grapheme_distance(black_box("p"), black_box("a"), system.as_ref()))
    });

    let word = parse_sequence("# s t r a k t a l p r i m s #", system.as_ref());
    c.bench_function("substrate/syllable_map", |b| {
        b.iter(|| syllable_map(black_box(&word), system.as_ref(), &SyllableConstraints::default()))
    });
}

criterion_group!(benches, bench_matching, bench_substrate);
criterion_main!(benches);

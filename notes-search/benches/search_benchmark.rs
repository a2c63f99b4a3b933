use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use notes_search::{Document, FilterCriteria, FuzzyIndex, MatchOptions};

const WORDS: &[&str] = &[
    "react", "hooks", "component", "state", "tokio", "runtime", "async", "borrow", "checker", "lifetime",
    "meeting", "agenda", "roadmap", "release", "checklist", "grocery", "recipe", "travel", "budget", "invoice",
    "kubernetes", "deployment", "database", "migration", "index", "query", "latency", "cache", "review", "design",
];

const NOTEBOOKS: &[&str] = &["Work", "Personal", "Side Projects", "Reading", "Archive"];

/// Deterministic synthetic corpus
fn corpus(size: usize) -> Vec<Document> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            let word = |k: usize| WORDS[(i * 7 + k * 13) % WORDS.len()];
            let title = format!("{} {} {}", word(0), word(1), word(2));
            let content = (0..60).map(word).collect::<Vec<_>>().join(" ");
            Document::new(i.to_string(), title, content, base + Duration::hours(i as i64))
                .with_tags([word(3), word(4)])
                .with_notebook(NOTEBOOKS[i % NOTEBOOKS.len()])
                .pinned(i % 17 == 0)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [1_000, 10_000] {
        let docs = corpus(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &docs, |b, docs| {
            b.iter(|| FuzzyIndex::build(docs, &MatchOptions::default()));
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let index = FuzzyIndex::build(&corpus(5_000), &MatchOptions::default());

    let queries = vec![
        ("short_2char", "re"),
        ("medium_word", "tokio"),
        ("long_word", "kubernetes"),
        ("multi_word", "release checklist"),
        ("fuzzy_typo", "kuberntes"),
        ("no_match", "zzzzzz"),
        ("long_query", "database migration latency review"),
    ];

    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for (name, query) in queries {
        group.bench_function(name, |b| b.iter(|| index.search(query)));
    }

    let criteria = FilterCriteria {
        notebooks: vec!["Work".into()],
        ..FilterCriteria::default()
    };
    group.bench_function("filtered", |b| b.iter(|| index.search_filtered("tokio", &criteria)));
    group.finish();
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);

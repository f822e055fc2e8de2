use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mcpkit_fuzzy::FuzzyMatcher;

const VOCABULARY: &[&str] = &[
    "function", "return", "database", "search", "query", "cache", "config", "request",
    "response", "async", "await", "import", "export", "variable", "parameter", "argument",
    "integer", "boolean", "string", "array", "object", "default", "exception", "threshold",
];

fn benchmark_correct_typos(c: &mut Criterion) {
    let matcher = FuzzyMatcher::default();

    c.bench_function("correct_typos", |b| {
        b.iter(|| matcher.correct_typos(black_box("fucntion retrun databse cahce lookup")))
    });
}

fn benchmark_fuzzy_match(c: &mut Criterion) {
    let matcher = FuzzyMatcher::default();

    c.bench_function("fuzzy_match", |b| {
        b.iter(|| matcher.fuzzy_match(black_box("databse"), black_box(VOCABULARY)))
    });
}

fn benchmark_generate_suggestions(c: &mut Criterion) {
    let matcher = FuzzyMatcher::default();

    c.bench_function("generate_suggestions", |b| {
        b.iter(|| matcher.generate_suggestions(black_box("serch databse confg"), black_box(VOCABULARY)))
    });
}

criterion_group!(
    benches,
    benchmark_correct_typos,
    benchmark_fuzzy_match,
    benchmark_generate_suggestions
);
criterion_main!(benches);

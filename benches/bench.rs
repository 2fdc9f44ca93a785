//! Criterion benchmarks for Pilum payload scoring.
//!
//! Covers the hot paths of a search:
//! - Compiling and caching scoring sources
//! - Merging the postings of several terms
//! - Scoring every matching document of a segment

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use pilum::config::ScoringConfig;
use pilum::expression::ExpressionEngine;
use pilum::payload::{ProducedToken, encode_int};
use pilum::search::IndexSearcher;
use pilum::segment::{IndexedDocument, SegmentBuilder, SegmentReader};

const TERMS: [&str; 8] = ["fn", "let", "impl", "trait", "match", "loop", "mut", "pub"];

/// Generate a segment whose documents hold a pseudo-random mix of terms.
fn generate_segment(doc_base: u64, count: usize) -> Arc<dyn SegmentReader> {
    let mut builder = SegmentBuilder::new(doc_base);
    for i in 0..count {
        let doc_length = 5 + (i % 20);
        let tokens = (0..doc_length)
            .map(|j| {
                let term = TERMS[(i * 7 + j * 13) % TERMS.len()];
                let line = ((i + j) % 500) as u32;
                let flags = if j % 11 == 0 { 1 << 29 } else { 0 };
                ProducedToken::new(term, encode_int(line | flags).to_vec())
            })
            .collect();
        builder.add_document(
            IndexedDocument::new()
                .tokens("body", tokens)
                .column("rank_int", (i % 100) as i64),
        );
    }
    Arc::new(builder.build())
}

const SOURCE: &str = r#"
for i in 0..term_count() {
    if is_matching(i) {
        let v = payload_int(i);
        if is_important(v) { add_score(2); }
        add_score(tf_idf(i));
    }
}
add_score(fc_int("rank_int") / 100.0);
"#;

/// Benchmark compilation and the compile cache.
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    group.bench_function("compile_uncached", |b| {
        b.iter_with_setup(
            || ExpressionEngine::with_capacity(16),
            |engine| black_box(engine.compile_and_cache(black_box(SOURCE)).unwrap()),
        )
    });

    let engine = ExpressionEngine::with_capacity(16);
    engine.compile_and_cache(SOURCE).unwrap();
    group.bench_function("compile_cached", |b| {
        b.iter(|| black_box(engine.compile_and_cache(black_box(SOURCE)).unwrap()))
    });

    group.finish();
}

/// Benchmark the scoring loop.
fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    group.sample_size(20);

    let docs_per_segment = 10_000;
    let segments: Vec<Arc<dyn SegmentReader>> = (0..4)
        .map(|s| generate_segment((s * docs_per_segment) as u64, docs_per_segment))
        .collect();

    for (name, parallel) in [("sequential", false), ("parallel", true)] {
        let config = ScoringConfig::default().with_parallel(parallel);
        let searcher = IndexSearcher::new(segments.clone(), config).unwrap();
        let query = searcher
            .query(SOURCE)
            .term("body", "fn")
            .term("body", "trait")
            .term("body", "mut")
            .column("rank_int")
            .build()
            .unwrap();

        group.throughput(Throughput::Elements(searcher.num_docs()));
        group.bench_function(format!("three_terms_{name}"), |b| {
            b.iter(|| black_box(searcher.search(&query, 10).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_scoring);
criterion_main!(benches);

//! Benchmarks for ash core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use ash::core::normalizer::{canonical_document, normalize};
use ash::journal::hasher;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};

fn legacy_recipe(steps: usize) -> Value {
    let mut items = vec![json!({"title": "Bench", "description": "legacy", "color": "cyan"})];
    for i in 0..steps {
        items.push(json!({
            "statement": format!("step {}", i),
            "function_name": "copy",
            "prompt_for": {"dest": "Destination"},
            "src": format!("/data/{}", i)
        }));
    }
    Value::Array(items)
}

fn flat_recipe(steps: usize) -> Value {
    let mut doc = Map::new();
    doc.insert("version".into(), json!("1.1"));
    doc.insert("title".into(), json!("Bench"));
    // Reverse insertion order so numeric sorting does real work.
    for i in (1..=steps).rev() {
        doc.insert(
            format!("step{}", i),
            json!({"statement": format!("step {}", i), "call_params": {"n": i}}),
        );
    }
    Value::Object(doc)
}

fn bench_normalize_legacy(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_legacy");
    for size in [10, 100, 1000] {
        let doc = legacy_recipe(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| black_box(normalize(black_box(doc)).unwrap()));
        });
    }
    group.finish();
}

fn bench_normalize_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_flat");
    for size in [10, 100, 1000] {
        let doc = flat_recipe(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| black_box(normalize(black_box(doc)).unwrap()));
        });
    }
    group.finish();
}

fn bench_canonical_document(c: &mut Criterion) {
    let recipe = normalize(&legacy_recipe(100)).unwrap().recipe;
    c.bench_function("canonical_document_100", |b| {
        b.iter(|| black_box(canonical_document(black_box(&recipe))));
    });
}

fn bench_source_hash(c: &mut Criterion) {
    let text = serde_json::to_string(&legacy_recipe(100)).unwrap();
    c.bench_function("source_hash_100", |b| {
        b.iter(|| black_box(hasher::hash_string(black_box(&text))));
    });
}

criterion_group!(
    benches,
    bench_normalize_legacy,
    bench_normalize_flat,
    bench_canonical_document,
    bench_source_hash
);
criterion_main!(benches);

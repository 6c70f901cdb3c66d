//! Benchmarks for docmigrate.
//!
//! Run with: cargo bench -p docmigrate

#![allow(clippy::pedantic)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docmigrate::store::firestore::encode_fields;
use docmigrate::{Export, MemoryStore, Migrator, MigratorOptions};
use serde_json::{json, Value};

/// Builds an export with one `records` collection of `size` documents.
fn synthetic_export(size: usize, with_ids: bool) -> Value {
    let docs: Vec<Value> = (0..size)
        .map(|i| {
            let mut doc = json!({
                "title": format!("Match {i}"),
                "score": i,
                "ratio": (i as f64) * 0.5,
                "tags": ["ranked", "eu-west"],
                "meta": { "round": i % 16, "final": i % 100 == 0 }
            });
            if with_ids {
                doc["id"] = json!(format!("rec-{i}"));
            }
            doc
        })
        .collect();

    json!({ "data": { "records": docs } })
}

/// Benchmark export parsing
fn bench_load_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_export");
    for size in [100, 1_000, 10_000] {
        let bytes = serde_json::to_vec(&synthetic_export(size, true)).unwrap();
        group.bench_with_input(BenchmarkId::new("documents", size), &bytes, |b, bytes| {
            b.iter(|| black_box(Export::from_slice(bytes).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark a full migration into the in-memory store
fn bench_migrate_memory(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for (label, with_ids) in [("explicit_ids", true), ("generated_ids", false)] {
        let mut group = c.benchmark_group(format!("migrate_memory_{label}"));
        for size in [100, 1_000, 5_000] {
            let export = Export::from_value(synthetic_export(size, with_ids)).unwrap();
            group.bench_with_input(BenchmarkId::new("documents", size), &export, |b, export| {
                b.to_async(&rt).iter(|| async {
                    let store = MemoryStore::new();
                    let report = Migrator::new(&store, MigratorOptions::default())
                        .migrate(export, &mut ())
                        .await
                        .unwrap();
                    black_box(report)
                })
            });
        }
        group.finish();
    }
}

/// Benchmark the effect of the per-commit write limit
fn bench_batch_limit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let export = Export::from_value(synthetic_export(5_000, true)).unwrap();

    let mut group = c.benchmark_group("batch_limit_impact");
    for limit in [50, 100, 250, 500] {
        group.bench_with_input(BenchmarkId::new("writes", limit), &limit, |b, &limit| {
            b.to_async(&rt).iter(|| async {
                let store = MemoryStore::new();
                let options = MigratorOptions {
                    max_batch_writes: limit,
                    ..Default::default()
                };
                let report = Migrator::new(&store, options)
                    .migrate(&export, &mut ())
                    .await
                    .unwrap();
                black_box(report)
            })
        });
    }
    group.finish();
}

/// Benchmark Firestore value encoding of a single document
fn bench_encode_document(c: &mut Criterion) {
    let export = synthetic_export(1, true);
    let doc = export["data"]["records"][0].as_object().unwrap().clone();

    c.bench_function("encode_firestore_fields", |b| {
        b.iter(|| black_box(encode_fields(&doc)))
    });
}

criterion_group!(
    benches,
    bench_load_export,
    bench_migrate_memory,
    bench_batch_limit,
    bench_encode_document,
);

criterion_main!(benches);

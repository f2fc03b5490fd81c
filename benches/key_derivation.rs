//! Benchmarks for cache key derivation
//!
//! This benchmark measures:
//! - Canonical JSON rendering for flat and nested inputs
//! - Full key derivation (canonicalize + SHA-256 + format)
//! - Round trip through the in-memory backend via the facade

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use unicache::cache::{canonical_json, CacheKeyGenerator, MemoryBackend, UnifiedCache};

fn input_with_fields(n: usize) -> Map<String, Value> {
    let mut map = Map::new();
    for i in (0..n).rev() {
        map.insert(
            format!("field_{i:03}"),
            json!({"value": i, "tags": ["a", "b"], "nested": {"z": i, "a": "x"}}),
        );
    }
    map
}

fn chat_input() -> Map<String, Value> {
    json!({
        "prompt": "Summarize the following release notes in three bullet points.",
        "system": "You are a concise technical writer.",
        "model": "gpt-4o-mini",
        "temperature": 0.2,
        "max_tokens": 256
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn bench_canonical_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_json");
    for fields in [4usize, 32, 256] {
        let value = Value::Object(input_with_fields(fields));
        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &value, |b, v| {
            b.iter(|| canonical_json(black_box(v)))
        });
    }
    group.finish();
}

fn bench_derive(c: &mut Criterion) {
    let keys = CacheKeyGenerator::default();
    let salted = CacheKeyGenerator::new("agent").with_salt("v2");
    let input = chat_input();

    c.bench_function("derive_chat_key", |b| {
        b.iter(|| keys.derive(black_box("summarizer"), black_box(&input)).to_string())
    });
    c.bench_function("derive_chat_key_salted", |b| {
        b.iter(|| salted.derive(black_box("summarizer"), black_box(&input)).to_string())
    });
}

fn bench_memory_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let cache = UnifiedCache::with_backend(Arc::new(MemoryBackend::default()));
    rt.block_on(cache.connect()).expect("memory backend connects");
    let value = Value::Object(input_with_fields(16));

    c.bench_function("memory_set_get", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache.set("bench:key", black_box(&value), None).await;
                black_box(cache.get("bench:key").await)
            })
        })
    });
}

criterion_group!(benches, bench_canonical_json, bench_derive, bench_memory_round_trip);
criterion_main!(benches);

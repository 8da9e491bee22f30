//! Benchmarks for fingerprinting and duplicate checks.
//!
//! Benchmark targets:
//! - Fingerprint of a typical item: <50us
//! - Dedup check against a full store (300 signatures): <20us
//! - Text normalization: <10us

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use quizpool::models::{ContentItem, DifficultyLevel, Provenance, Signature};
use quizpool::services::deduplication::{
    DeduplicationConfig, DeduplicationService, Fingerprinter, normalize,
};
use quizpool::{FingerprintStore, MemoryFingerprintStore};

const SHORT_TEXT: &str = "Which planet has the most moons?";
const ITEM_TEXT: &str = "In the early twentieth century, which physicist proposed that light \
    is quantized into discrete packets of energy, later called photons, to explain the \
    photoelectric effect observed when light strikes a metal surface?";

fn sample_item() -> ContentItem {
    ContentItem::new(
        "science",
        "physics",
        ITEM_TEXT,
        "Albert Einstein",
        DifficultyLevel::Intermediate,
        Provenance::Generative,
    )
    .with_choices(["Max Planck", "Albert Einstein", "Niels Bohr", "Ernest Rutherford"])
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    group.measurement_time(Duration::from_secs(5));
    let fp = Fingerprinter::default();

    group.bench_function("short_text", |b| {
        b.iter(|| fp.fingerprint_text(black_box(SHORT_TEXT)));
    });

    let item = sample_item();
    group.bench_function("item", |b| {
        b.iter(|| fp.fingerprint(black_box(&item)));
    });

    group.finish();
}

fn bench_fingerprint_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint_scaling");
    let fp = Fingerprinter::default();

    for words in [10usize, 50, 100, 500] {
        let text: String = (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            b.iter(|| fp.fingerprint_text(black_box(text)));
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("item_text", |b| {
        b.iter(|| normalize(black_box(ITEM_TEXT)));
    });

    group.finish();
}

fn bench_dedup_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_check");

    for stored in [0usize, 100, 300] {
        let store = Arc::new(MemoryFingerprintStore::with_capacity(300));
        for n in 0..stored {
            // Spread bits so nothing is within the threshold.
            let value = (n as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let _ = store.insert(Signature::new(value));
        }
        let service = DeduplicationService::new(DeduplicationConfig::default(), store);
        let signature = service.fingerprint(&sample_item());

        group.bench_with_input(BenchmarkId::new("stored", stored), &signature, |b, sig| {
            b.iter(|| service.check(black_box(*sig)));
        });
    }

    group.finish();
}

fn bench_hamming(c: &mut Criterion) {
    let a = Signature::new(0x0123_4567_89AB_CDEF);
    let b_sig = Signature::new(0xFEDC_BA98_7654_3210);

    c.bench_function("hamming_distance", |b| {
        b.iter(|| black_box(a).hamming_distance(black_box(b_sig)));
    });
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_fingerprint_scaling,
    bench_normalize,
    bench_dedup_check,
    bench_hamming,
);

criterion_main!(benches);

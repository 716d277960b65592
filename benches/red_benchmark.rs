//! Benchmarks for the RED codec on representative signals.
//!
//! Run with: cargo bench --bench red_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mef3_rs::red::{compress, decompress, CompressionParams};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

const BLOCK_SAMPLES: usize = 10_000;

/// Smooth signal: small consecutive differences, mostly 1-byte codes.
fn sine_block() -> Vec<i32> {
    (0..BLOCK_SAMPLES)
        .map(|i| (10_000.0 * (i as f64 / 250.0).sin()) as i32)
        .collect()
}

/// Noisy signal: differences spread across the 2- and 3-byte codes.
fn noisy_block() -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(99);
    let dist = Uniform::from(-100_000..=100_000);
    (0..BLOCK_SAMPLES).map(|_| dist.sample(&mut rng)).collect()
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("red_compress");
    group.throughput(Throughput::Bytes(
        (BLOCK_SAMPLES * std::mem::size_of::<i32>()) as u64,
    ));

    for (name, samples) in [("sine", sine_block()), ("noise", noisy_block())] {
        group.bench_function(name, |b| {
            b.iter(|| {
                compress(
                    black_box(&samples),
                    0,
                    &CompressionParams::default(),
                    None,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("red_decompress");
    group.throughput(Throughput::Bytes(
        (BLOCK_SAMPLES * std::mem::size_of::<i32>()) as u64,
    ));

    for (name, samples) in [("sine", sine_block()), ("noise", noisy_block())] {
        let block = compress(&samples, 0, &CompressionParams::default(), None)
            .unwrap()
            .compressed_data;
        group.bench_function(name, |b| {
            b.iter(|| decompress(black_box(&block), None, false).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);

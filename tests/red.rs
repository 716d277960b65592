use mef3_rs::blocks::RED_BLOCK_HEADER_BYTES;
use mef3_rs::red::{
    compress, decompress, find_extrema, CompressionParams, RED_MAXIMUM_SAMPLE_VALUE,
    RED_MINIMUM_SAMPLE_VALUE, RED_NAN,
};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn round_trip(samples: &[i32]) -> Vec<u8> {
    let compressed = compress(samples, 1_000_000, &CompressionParams::default(), None)
        .expect("compression succeeds");
    let decoded = decompress(&compressed.compressed_data, None, true).expect("decompression succeeds");
    assert_eq!(decoded.samples, samples);
    assert_eq!(
        decoded.block_header.number_of_samples as usize,
        samples.len()
    );
    compressed.compressed_data
}

#[test]
fn small_lossless_block() {
    let samples = [100, 102, 105, 108, 110, 112, 115, 118, 120, 125];
    let block = round_trip(&samples);

    // Small consecutive differences all take the one-byte encoding.
    let difference_bytes = block.len() - RED_BLOCK_HEADER_BYTES;
    assert!(difference_bytes < samples.len() * std::mem::size_of::<i32>());
}

#[test]
fn sine_wave_compresses_below_half() {
    let samples: Vec<i32> = (0..1000)
        .map(|i| (1000.0 * (2.0 * std::f64::consts::PI * i as f64 / 100.0).sin()) as i32)
        .collect();
    let block = round_trip(&samples);

    let ratio = block.len() as f64 / (samples.len() * std::mem::size_of::<i32>()) as f64;
    assert!(ratio < 0.5, "compression ratio {ratio} not below 0.5");
}

#[test]
fn seeded_random_data() {
    let mut rng = StdRng::seed_from_u64(42);
    let dist = Uniform::from(-1000..=1000);
    let samples: Vec<i32> = (0..500).map(|_| dist.sample(&mut rng)).collect();
    round_trip(&samples);
}

#[test]
fn full_range_random_data() {
    let mut rng = StdRng::seed_from_u64(7);
    let dist = Uniform::from(RED_MINIMUM_SAMPLE_VALUE..=RED_MAXIMUM_SAMPLE_VALUE);
    let samples: Vec<i32> = (0..10_000).map(|_| dist.sample(&mut rng)).collect();
    round_trip(&samples);
}

#[test]
fn random_data_with_nan_runs() {
    let mut rng = StdRng::seed_from_u64(1234);
    let dist = Uniform::from(-100_000..=100_000);
    let samples: Vec<i32> = (0..5000)
        .map(|i| if i % 97 < 5 { RED_NAN } else { dist.sample(&mut rng) })
        .collect();
    round_trip(&samples);
}

#[test]
fn long_block_round_trip() {
    // A full second at 100 kHz in a single block.
    let samples: Vec<i32> = (0..100_000)
        .map(|i| ((i as f64 / 777.0).sin() * 2_000_000.0) as i32)
        .collect();
    round_trip(&samples);
}

#[test]
fn extrema_scenario() {
    assert_eq!(find_extrema(&[-100, 50, 200, -300, 150, 0, 75]), (-300, 200));
}

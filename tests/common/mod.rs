//! Shared fixtures for integration tests
//!
//! Random data is drawn from a seeded `ChaCha8Rng` so every run sees the
//! same inputs.

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use serial_test::serial;

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` values uniform in `[-scale, scale)`
pub fn random_f32(seed: u64, n: usize, scale: f32) -> Vec<f32> {
    let mut rng = rng(seed);
    (0..n).map(|_| rng.gen_range(-scale..scale)).collect()
}

/// `base` plus uniform noise of magnitude `noise`
pub fn perturbed(seed: u64, base: &[f32], noise: f32) -> Vec<f32> {
    let mut rng = rng(seed);
    base.iter().map(|x| x + rng.gen_range(-noise..noise)).collect()
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn read_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn read_i32(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn dot(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

pub fn assert_close(actual: f32, expected: f32, tol: f32) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {} within {}, got {}",
        expected,
        tol,
        actual
    );
}

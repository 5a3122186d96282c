//! Quantized dot product benchmark
//!
//! Compares f32 dot products against Q8_0 and Q8_A8 block dot products, and
//! measures the quantize and dequantize kernels they rely on.
//!
//! Run with: `cargo bench --bench quant_dot_bench`

use std::hint::black_box;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tensorforge::kernels::quant::{dequantize_row, quantize_row, vec_dot};
use tensorforge::GgmlType;

// ============================================================================
// Benchmark Harness
// ============================================================================

struct Benchmark {
    name: String,
    iterations: usize,
    warmup_iterations: usize,
}

impl Benchmark {
    fn new(name: &str, iterations: usize) -> Self {
        Benchmark {
            name: name.to_string(),
            iterations,
            warmup_iterations: iterations.min(10),
        }
    }

    fn run_time<F, R>(&self, mut f: F) -> BenchmarkResult
    where
        F: FnMut() -> R,
    {
        for _ in 0..self.warmup_iterations {
            black_box(f());
        }

        let mut durations = Vec::with_capacity(self.iterations);
        for _ in 0..self.iterations {
            let start = Instant::now();
            black_box(f());
            durations.push(start.elapsed());
        }

        BenchmarkResult {
            name: self.name.clone(),
            durations,
        }
    }
}

struct BenchmarkResult {
    name: String,
    durations: Vec<Duration>,
}

impl BenchmarkResult {
    fn avg(&self) -> Duration {
        let total: Duration = self.durations.iter().sum();
        total / self.durations.len().max(1) as u32
    }

    fn percentile(&self, p: usize) -> Duration {
        let mut sorted = self.durations.clone();
        sorted.sort();
        sorted
            .get((sorted.len() * p / 100).min(sorted.len().saturating_sub(1)))
            .copied()
            .unwrap_or_default()
    }

    fn report(&self, elements: usize) {
        let avg = self.avg();
        let per_sec = elements as f64 / avg.as_secs_f64().max(f64::EPSILON);
        println!("\n=== {} ===", self.name);
        println!("Iterations: {}", self.durations.len());
        println!("Average: {:?}", avg);
        println!("P50:     {:?}", self.percentile(50));
        println!("P95:     {:?}", self.percentile(95));
        println!("Throughput: {:.2} million elements/sec", per_sec / 1e6);
    }
}

// ============================================================================
// Test Data Generation
// ============================================================================

const ROW_LEN: usize = 4096;
const ITERATIONS: usize = 200;

fn random_row(seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..ROW_LEN).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn f32_dot(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

fn main() -> Result<()> {
    println!("========================================");
    println!("tensorforge Quantized Dot Benchmark");
    println!("========================================");
    println!("Row length: {} elements", ROW_LEN);

    let x = random_row(1);
    let y = random_row(2);
    let reference = f32_dot(&x, &y);

    Benchmark::new("F32 dot", ITERATIONS)
        .run_time(|| f32_dot(black_box(&x), black_box(&y)))
        .report(ROW_LEN);

    for dtype in [GgmlType::Q8_0, GgmlType::Q8_A8] {
        let xq = quantize_row(dtype, &x)?;
        let yq = quantize_row(dtype, &y)?;

        Benchmark::new(&format!("{} quantize", dtype), ITERATIONS)
            .run_time(|| quantize_row(dtype, black_box(&x)))
            .report(ROW_LEN);

        Benchmark::new(&format!("{} dequantize", dtype), ITERATIONS)
            .run_time(|| dequantize_row(dtype, black_box(&xq), ROW_LEN))
            .report(ROW_LEN);

        Benchmark::new(&format!("{} dot", dtype), ITERATIONS)
            .run_time(|| vec_dot(dtype, ROW_LEN, black_box(&xq), black_box(&yq)))
            .report(ROW_LEN);

        let quantized = vec_dot(dtype, ROW_LEN, &xq, &yq)?;
        println!(
            "{} dot: {:.6} (f32 {:.6}, abs error {:.2e}), {} bytes vs {} bytes f32",
            dtype,
            quantized,
            reference,
            (quantized - reference).abs(),
            xq.len(),
            ROW_LEN * 4
        );
    }
    Ok(())
}

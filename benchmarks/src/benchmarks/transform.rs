//! In-memory transform and scan benchmarks

use mulekit_benchmarks::generate_config;
use mulekit_core::{scan, strip_marker, PropertyMatcher};

use crate::{run_benchmark, BenchmarkResult};

const CATEGORY: &str = "Transform";
const ITERATIONS: u32 = 50;

pub fn run_all() -> Vec<BenchmarkResult> {
    let matcher = PropertyMatcher::default();
    let mut results = Vec::new();

    for (label, lines) in [("1k", 1_000), ("50k", 50_000)] {
        let content = generate_config(lines, 11);
        let bytes = Some(content.len() as u64);

        results.push(run_benchmark(
            &format!("Strip markers ({} elements)", label),
            CATEGORY,
            ITERATIONS,
            bytes,
            || {
                std::hint::black_box(strip_marker(&content));
            },
        ));
        results.push(run_benchmark(
            &format!("Scan violations ({} elements)", label),
            CATEGORY,
            ITERATIONS,
            bytes,
            || {
                std::hint::black_box(scan(&content, &matcher));
            },
        ));
    }
    results
}

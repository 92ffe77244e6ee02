//! Mulekit Benchmark Runner
//!
//! Quick wall-clock numbers without criterion; `--json-only` prints the
//! report instead of saving it under `benchmarks/results/`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;

mod benchmarks;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub category: String,
    pub iterations: u32,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// MB/s, when the benchmark processes a known number of bytes
    pub throughput_mb_s: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub timestamp: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub results: Vec<BenchmarkResult>,
    /// Total mean time per category
    pub category_totals_ms: BTreeMap<String, f64>,
}

pub fn run_benchmark<F>(name: &str, category: &str, iterations: u32, bytes: Option<u64>, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    f(); // Warmup
    let times_ms: Vec<f64> = (0..iterations)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed().as_secs_f64() * 1000.0
        })
        .collect();

    let mean_ms = times_ms.iter().sum::<f64>() / times_ms.len().max(1) as f64;
    let min_ms = times_ms.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_ms = times_ms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let throughput_mb_s = bytes.map(|b| (b as f64 * 1000.0) / mean_ms / (1024.0 * 1024.0));

    BenchmarkResult {
        name: name.to_string(),
        category: category.to_string(),
        iterations,
        mean_ms,
        min_ms,
        max_ms,
        throughput_mb_s,
    }
}

fn print_report(report: &BenchmarkReport) {
    println!("\n======== Mulekit Benchmark Report ========");
    println!("Version: {} | {} ({})", report.version, report.os, report.arch);
    let mut current = "";
    for r in &report.results {
        if r.category != current {
            current = &r.category;
            println!("--- {} ---", current);
        }
        print!("  {:<40} {:>8.3}ms [{:.3}..{:.3}]", r.name, r.mean_ms, r.min_ms, r.max_ms);
        if let Some(tp) = r.throughput_mb_s {
            print!(" {:.2} MB/s", tp);
        }
        println!();
    }
    println!("\nTotal: {} benchmarks", report.results.len());
}

fn main() -> Result<()> {
    let json_only = std::env::args().any(|a| a == "--json-only");

    let mut results = Vec::new();
    results.extend(benchmarks::transform::run_all());
    results.extend(benchmarks::backup::run_all()?);

    let mut category_totals_ms = BTreeMap::new();
    for r in &results {
        *category_totals_ms.entry(r.category.clone()).or_insert(0.0) += r.mean_ms;
    }

    let report = BenchmarkReport {
        timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        results,
        category_totals_ms,
    };

    if json_only {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        fs::create_dir_all("benchmarks/results")?;
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        fs::write(
            format!("benchmarks/results/benchmark-{}.json", ts),
            serde_json::to_string_pretty(&report)?,
        )?;
        println!("\nResults saved to benchmarks/results/");
    }
    Ok(())
}

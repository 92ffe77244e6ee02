//! Snapshot and restore of a synthetic config tree

use std::fs;

use anyhow::Result;
use mulekit_benchmarks::generate_config;
use mulekit_core::{resolve, strip_file, BackupSnapshot};
use tempfile::TempDir;

use crate::{run_benchmark, BenchmarkResult};

const CATEGORY: &str = "Backup";
const ITERATIONS: u32 = 20;

pub fn run_all() -> Result<Vec<BenchmarkResult>> {
    let project = TempDir::new()?;
    let backups = TempDir::new()?;
    let tree = project.path().join("src/main/mule");
    for i in 0..200 {
        let dir = tree.join(format!("flows/group{}", i % 10));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("flow{}.xml", i)), generate_config(200, i))?;
    }
    let files = resolve(&tree, "xml");
    let bytes: u64 = files
        .iter()
        .filter_map(|f| fs::metadata(f).ok())
        .map(|m| m.len())
        .sum();

    let snapshot_restore = run_benchmark("Snapshot + restore (200 files)", CATEGORY, ITERATIONS, Some(bytes), || {
        if let Ok(mut snapshot) = BackupSnapshot::capture(&tree, &files, backups.path()) {
            let _ = snapshot.restore();
        }
    });

    let strip_cycle = run_benchmark("Snapshot, strip, restore (200 files)", CATEGORY, ITERATIONS, Some(bytes), || {
        if let Ok(mut snapshot) = BackupSnapshot::capture(&tree, &files, backups.path()) {
            for file in &files {
                let _ = strip_file(file, false);
            }
            let _ = snapshot.restore();
        }
    });

    Ok(vec![snapshot_restore, strip_cycle])
}

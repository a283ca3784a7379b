//! Performance benchmarks for Treesync
//!
//! Measures the cost of building a snapshot of a generated tree.
//!
//! **Benchmarks Included:**
//! - `walk`: raw concurrent walk at several tree sizes
//! - `scan`: walk, gitignore filter and index together
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                 # Run all benchmarks
//! cargo bench -- scan         # Scan only
//! ```

use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;
use treesync::config::IgnoreConfig;
use treesync::watcher::{scan, RulesetMap, StaticIgnore, Walker};

/// Build `dirs` directories with `files_per_dir` files each, plus a
/// `.gitignore` in every tenth directory and one ignored `node_modules`.
fn generate_tree(root: &Path, dirs: usize, files_per_dir: usize) {
    for d in 0..dirs {
        let dir = root.join(format!("dir_{:03}/nested_{}", d, d % 7));
        fs::create_dir_all(&dir).expect("failed to create dir");
        for f in 0..files_per_dir {
            let ext = if f % 5 == 0 { "log" } else { "rs" };
            fs::write(dir.join(format!("file_{f}.{ext}")), "fn main() {}")
                .expect("failed to write file");
        }
        if d % 10 == 0 {
            fs::write(dir.join(".gitignore"), "*.log\n").expect("failed to write gitignore");
        }
    }

    let modules = root.join("node_modules/pkg");
    fs::create_dir_all(&modules).expect("failed to create node_modules");
    for f in 0..files_per_dir {
        fs::write(modules.join(format!("m_{f}.js")), "x").expect("failed to write file");
    }
}

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");
    group.sample_size(10);

    for dirs in [10, 100, 500] {
        let tmp = TempDir::new().expect("failed to create temp dir");
        generate_tree(tmp.path(), dirs, 20);
        let walker = Walker::new(
            StaticIgnore::new(&IgnoreConfig::default()).expect("failed to compile patterns"),
        );

        group.bench_with_input(BenchmarkId::from_parameter(dirs), &dirs, |b, _| {
            b.iter(|| black_box(walker.walk(tmp.path()).expect("walk failed")));
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    group.sample_size(10);

    for dirs in [10, 100, 500] {
        let tmp = TempDir::new().expect("failed to create temp dir");
        generate_tree(tmp.path(), dirs, 20);
        let walker = Walker::new(
            StaticIgnore::new(&IgnoreConfig::default()).expect("failed to compile patterns"),
        );
        let known = RulesetMap::new();

        group.bench_with_input(BenchmarkId::from_parameter(dirs), &dirs, |b, _| {
            b.iter(|| black_box(scan(&walker, tmp.path(), &known).expect("scan failed")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_walk, bench_scan);
criterion_main!(benches);

//! mish ベンチマーク: パーサーとジョブテーブルの計測。
//!
//! `std::time::Instant` による手動計測（外部クレート不要）。
//!
//! 実行: `cargo bench`

use std::time::{Duration, Instant};

use mish::job::JobTable;
use mish::parser;

// ── ベンチマークインフラ ──────────────────────────────────────────

struct BenchResult {
    category: &'static str,
    name: &'static str,
    avg: Duration,
    iters: u64,
}

impl BenchResult {
    fn print(&self) {
        let avg_us = self.avg.as_nanos() as f64 / 1000.0;
        println!(
            "[{:<8}] {:<40}: avg {:>10.2}µs  ({} iters)",
            self.category, self.name, avg_us, self.iters,
        );
    }
}

fn bench<F: FnMut()>(
    category: &'static str,
    name: &'static str,
    iters: u64,
    mut f: F,
) -> BenchResult {
    // ウォームアップ
    for _ in 0..iters.min(100) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    BenchResult {
        category,
        name,
        avg: elapsed / iters as u32,
        iters,
    }
}

// ── メイン ────────────────────────────────────────────────────────

fn main() {
    println!("mish benchmark suite");
    println!("{}", "=".repeat(80));

    let mut results = Vec::new();

    // ── パーサー ──
    println!("\n--- Parser ---");

    results.push(bench("parser", "echo hello", 10_000, || {
        let _ = parser::parse("echo hello");
    }));

    results.push(bench("parser", "echo 'hello world' \"a b\"", 10_000, || {
        let _ = parser::parse("echo 'hello world' \"a b\"");
    }));

    results.push(bench("parser", "ls | grep Cargo | head -1", 10_000, || {
        let _ = parser::parse("ls | grep Cargo | head -1");
    }));

    results.push(bench("parser", "sort < in.txt >> out.txt", 10_000, || {
        let _ = parser::parse("sort < in.txt >> out.txt");
    }));

    results.push(bench("parser", "sleep 1 &", 10_000, || {
        let _ = parser::parse("sleep 1 &");
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── ジョブテーブル ──
    println!("\n--- JobTable ---");

    results.push(bench("jobs", "insert + mark + drain (8 jobs)", 10_000, || {
        let mut table = JobTable::new();
        for i in 0..8 {
            let pgid = 1000 + i;
            table.insert(pgid, "sleep 1".to_string(), vec![pgid]);
        }
        for i in 0..8 {
            // 正常終了 (status 0) をマーク
            table.mark_pid(1000 + i, 0);
        }
        table.drain_done(|_| {});
    }));

    for r in &results {
        r.print();
    }

    println!("\n{}", "=".repeat(80));
    println!("done.");
}

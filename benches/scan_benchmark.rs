//! Tag scanner throughput.
//!
//! ```bash
//! cargo bench -- scan
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tagindex::watcher::tags;

/// Source text with a marker every `every` lines.
fn synthetic_source(lines: usize, every: usize) -> String {
    let mut out = String::with_capacity(lines * 40);
    for i in 0..lines {
        if i % every == 0 {
            out.push_str("    // TODO: handle the edge case here\n");
        } else {
            out.push_str("    let value = compute(input, 42);\n");
        }
    }
    out
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for lines in [100, 1_000, 10_000] {
        let source = synthetic_source(lines, 25);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("text", lines), &source, |b, src| {
            b.iter(|| tags::scan(black_box(src)));
        });
        group.bench_with_input(BenchmarkId::new("bytes", lines), &source, |b, src| {
            b.iter(|| tags::scan_bytes(black_box(src.as_bytes())));
        });
    }

    group.finish();
}

fn bench_dense_line(c: &mut Criterion) {
    let line = "// TODO: a FIXME: b BUG: c HACK: d XXX: e ".repeat(50);
    c.bench_function("scan_dense_line", |b| {
        b.iter(|| tags::scan(black_box(&line)));
    });
}

criterion_group!(benches, bench_scan, bench_dense_line);
criterion_main!(benches);

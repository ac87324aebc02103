//! Line set parsing and lookup benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linefind_protocol::Query;
use linefind_server::{LineSet, LineSource};
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;

const SIZES: &[usize] = &[10_000, 250_000];

fn file_contents(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("3;0;1;28;0;7;5;{};\n", i))
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_set_parse");
    for &size in SIZES {
        let text = file_contents(size);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| black_box(LineSet::parse(black_box(text))))
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_set_lookup");
    for &size in SIZES {
        let lines = LineSet::parse(&file_contents(size));
        let last = Query::new(format!("3;0;1;28;0;7;5;{};", size - 1)).unwrap();
        let missing = Query::new("3;0;1;28;0;7;5;missing;").unwrap();

        group.bench_with_input(BenchmarkId::new("hit_last", size), &lines, |b, lines| {
            b.iter(|| black_box(lines.lookup(black_box(&last))))
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &lines, |b, lines| {
            b.iter(|| black_box(lines.lookup(black_box(&missing))))
        });
    }
    group.finish();
}

fn bench_source_modes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(file_contents(250_000).as_bytes()).unwrap();
    file.flush().unwrap();

    let reread = LineSource::reread(file.path());
    let cached = LineSource::cached(file.path());

    let mut group = c.benchmark_group("line_source");
    group.sample_size(20);
    group.bench_function("reread", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(reread.current_lines().await.unwrap()) })
    });
    group.bench_function("cached", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cached.current_lines().await.unwrap()) })
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_lookup, bench_source_modes);
criterion_main!(benches);

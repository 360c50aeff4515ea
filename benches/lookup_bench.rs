use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use georange::{MemoryStore, RangeIndex, RangeRecord, WriteBatch};
use std::hint::black_box;
use std::time::Duration;

/// Index of `count` adjacent /24 ranges starting at 1.0.0.0
fn build_index(count: u32) -> RangeIndex<MemoryStore> {
    let index = RangeIndex::new(MemoryStore::new());
    let mut batch = WriteBatch::new();
    for i in 0..count {
        let min = 16_777_216 + i * 256;
        let record = RangeRecord::new(min, min + 255, 40.0, -74.0, "10001");
        index.stage(&mut batch, &record).unwrap();
    }
    index.commit(batch).unwrap();
    index
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    group.measurement_time(Duration::from_secs(5));

    for count in [1_000u32, 100_000] {
        let index = build_index(count);
        let span = count * 256;
        // Odd stride so queries land all over the covered space
        let queries: Vec<u32> = (0..1000u32)
            .map(|i| 16_777_216 + (i.wrapping_mul(7_919) % span))
            .collect();

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(BenchmarkId::new("hit", count), &queries, |b, queries| {
            b.iter(|| {
                for &ip in queries {
                    black_box(index.lookup(ip).unwrap());
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("miss_below", count), &count, |b, _| {
            b.iter(|| black_box(index.lookup(black_box(42)).unwrap()))
        });
    }

    group.finish();
}

fn bench_lookup_str(c: &mut Criterion) {
    let index = build_index(10_000);
    let mut group = c.benchmark_group("lookup_str");

    for query in ["1.0.42.7", "16788999", "::ffff:1.0.0.1"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, query| {
            b.iter(|| black_box(index.lookup_str(query).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_lookup_str);
criterion_main!(benches);

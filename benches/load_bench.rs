use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use georange::reference::{CountryRow, LocationRow, RegionRow};
use georange::{
    BulkLoader, CountryTable, LocationTable, MemoryStore, RangeIndex, RangeRow, RegionTable,
};
use std::hint::black_box;

fn location_table(locations: usize) -> LocationTable {
    let countries = CountryTable::build(vec![CountryRow {
        name: "UNITED STATES".to_string(),
        code: "US".to_string(),
        code3: "USA".to_string(),
        number: "840".to_string(),
    }]);
    let regions = RegionTable::build(vec![RegionRow {
        country_code: "US".to_string(),
        region_code: "NY".to_string(),
        region_name: "New York".to_string(),
    }]);
    let rows = (0..locations).map(|i| LocationRow {
        location_id: i.to_string(),
        country: "US".to_string(),
        region: "NY".to_string(),
        postal_code: format!("{:05}", i % 100_000),
        latitude: format!("{:.4}", 40.0 + (i % 100) as f64 / 100.0),
        longitude: "-74.0000".to_string(),
        ..LocationRow::default()
    });
    LocationTable::build(rows, &countries, &regions)
}

fn range_rows(count: u32, locations: usize) -> Vec<RangeRow> {
    (0..count)
        .map(|i| {
            let min = 16_777_216 + i * 256;
            RangeRow::new(
                min.to_string(),
                (min + 255).to_string(),
                (i as usize % locations).to_string(),
            )
        })
        .collect()
}

fn bench_bulk_load(c: &mut Criterion) {
    let locations = location_table(1_000);
    let mut group = c.benchmark_group("bulk_load");
    group.sample_size(20);

    for batch_size in [100usize, 10_000] {
        let rows = range_rows(20_000, 1_000);
        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &rows, |b, rows| {
            b.iter(|| {
                let index = RangeIndex::new(MemoryStore::new());
                let report = BulkLoader::new(&index, &locations)
                    .with_batch_size(batch_size)
                    .load(rows.iter().cloned().map(Ok))
                    .unwrap();
                black_box(report)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bulk_load);
criterion_main!(benches);

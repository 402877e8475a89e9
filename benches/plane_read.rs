//! Plane read throughput: shared memory map vs private file cursor vs
//! fully loaded data region

use calvin_rs::{
    write_file, ColumnInfo, ColumnValue, ContainerConfig, DataGroupHeader, DataSetHeader,
    FileHeader, GenericData, GenericDataHeader,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_intensities(dir: &Path, rows: u32) -> PathBuf {
    let mut ds = DataSetHeader::new("Intensities");
    ds.add_column(ColumnInfo::float("Intensity")).unwrap();
    ds.add_column(ColumnInfo::uint16("Pixels")).unwrap();
    ds.add_column(ColumnInfo::ascii("Probe", 12)).unwrap();
    ds.set_row_count(rows).unwrap();
    let mut group = DataGroupHeader::new("Default");
    group.add_data_set(ds).unwrap();
    let mut header = FileHeader::new(GenericDataHeader::new("bench"));
    header.add_group(group).unwrap();

    let path = dir.join(format!("bench-{}.calvin", rows));
    write_file(&path, header, |ds, sink| {
        for row in 0..ds.row_count() {
            sink.write_row(&[
                ColumnValue::Float(row as f32 * 0.5),
                ColumnValue::UInt16((row % 65_536) as u16),
                ColumnValue::from(format!("AFFX-{}", row)),
            ])?;
        }
        Ok(())
    })
    .unwrap();
    path
}

fn backings() -> Vec<(&'static str, ContainerConfig)> {
    vec![
        ("mapped", ContainerConfig::default()),
        (
            "stream",
            ContainerConfig {
                use_memory_mapping: false,
                ..Default::default()
            },
        ),
        (
            "loaded",
            ContainerConfig {
                use_memory_mapping: false,
                load_entire_data_set: true,
                ..Default::default()
            },
        ),
    ]
}

/// Whole-column reads
fn bench_column_reads(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("plane_column_read");

    for rows in [1_000u32, 100_000] {
        let path = write_intensities(dir.path(), rows);
        group.throughput(Throughput::Elements(u64::from(rows)));

        for (name, config) in backings() {
            let data = GenericData::open_with_config(&path, config).unwrap();
            group.bench_with_input(BenchmarkId::new(name, rows), &rows, |b, &rows| {
                let mut plane = data.data_set("Default", "Intensities").unwrap().unwrap();
                b.iter(|| {
                    let values = plane.column::<f32>(0, 0, u64::from(rows)).unwrap();
                    black_box(values);
                });
            });
        }
    }

    group.finish();
}

/// Scattered single-cell reads
fn bench_random_cells(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let rows = 100_000u32;
    let path = write_intensities(dir.path(), rows);
    let picks: Vec<u64> = (0..1_000).map(|_| u64::from(rand::random::<u32>() % rows)).collect();

    let mut group = c.benchmark_group("plane_random_cells");
    group.throughput(Throughput::Elements(picks.len() as u64));

    for (name, config) in backings() {
        let data = GenericData::open_with_config(&path, config).unwrap();
        group.bench_function(name, |b| {
            let mut plane = data.data_set("Default", "Intensities").unwrap().unwrap();
            b.iter(|| {
                for &row in &picks {
                    black_box(plane.get::<String>(row, 2).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Plane creation cost, including the first map or full load
fn bench_open_plane(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = write_intensities(dir.path(), 100_000);

    let mut group = c.benchmark_group("plane_open");
    group.sample_size(20);

    for (name, config) in backings() {
        group.bench_function(name, |b| {
            b.iter(|| {
                let data = GenericData::open_with_config(&path, config.clone()).unwrap();
                black_box(data.data_set("Default", "Intensities").unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_column_reads, bench_random_cells, bench_open_plane);
criterion_main!(benches);

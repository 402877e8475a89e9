//! Container comparison through the public reader API

use calvin_rs::{
    compare_files, write_file, ColumnInfo, ColumnValue, CompareOptions, DataGroupHeader,
    DataSetHeader, Difference, FileHeader, GenericDataHeader, Parameter, ParameterValue, Side,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Sample<'a> {
    data_sets: &'a [&'a str],
    schema_text: bool,
    parent_type: &'a str,
    cells: &'a [u16],
}

impl Default for Sample<'_> {
    fn default() -> Self {
        Sample {
            data_sets: &["A", "B"],
            schema_text: false,
            parent_type: "scan",
            cells: &[1, 2, 3],
        }
    }
}

fn write(dir: &Path, name: &str, sample: Sample<'_>) -> PathBuf {
    let mut group = DataGroupHeader::new("Default");
    for ds_name in sample.data_sets {
        let mut ds = DataSetHeader::new(*ds_name);
        ds.add_column(ColumnInfo::uint16("v")).unwrap();
        if sample.schema_text {
            ds.add_column(ColumnInfo::text("t", 4)).unwrap();
        }
        ds.set_row_count(sample.cells.len() as u32).unwrap();
        group.add_data_set(ds).unwrap();
    }

    let mut parent = GenericDataHeader::new(sample.parent_type);
    parent.add_parameter(Parameter::new("Gain", ParameterValue::Float(1.0)));
    let mut metadata = GenericDataHeader::new("analysis");
    metadata.add_parent(parent);
    let mut header = FileHeader::new(metadata);
    header.add_group(group).unwrap();

    let path = dir.join(name);
    write_file(&path, header, |ds, sink| {
        for v in sample.cells {
            let mut row = vec![ColumnValue::UInt16(*v)];
            if ds.column_count() == 2 {
                row.push(ColumnValue::from("t"));
            }
            sink.write_row(&row)?;
        }
        Ok(())
    })
    .unwrap();
    path
}

#[test]
fn test_same_content_different_files() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.calvin", Sample::default());
    let b = write(dir.path(), "b.calvin", Sample::default());

    let report = compare_files(&a, &b, &CompareOptions::default()).unwrap();
    assert!(report.is_equivalent(), "{}", report.to_json().unwrap());
    assert_eq!(report.data_sets_compared, 2);
}

#[test]
fn test_missing_data_set_is_reported_per_side() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.calvin", Sample::default());
    let b = write(
        dir.path(),
        "b.calvin",
        Sample {
            data_sets: &["A", "C"],
            ..Default::default()
        },
    );

    let report = compare_files(&a, &b, &CompareOptions::default()).unwrap();
    assert!(report.differences.contains(&Difference::MissingDataSet {
        group: "Default".into(),
        data_set: "B".into(),
        present_in: Side::Left,
    }));
    assert!(report.differences.contains(&Difference::MissingDataSet {
        group: "Default".into(),
        data_set: "C".into(),
        present_in: Side::Right,
    }));
    assert_eq!(report.data_sets_compared, 1);
}

#[test]
fn test_schema_difference_skips_cells() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.calvin", Sample::default());
    let b = write(
        dir.path(),
        "b.calvin",
        Sample {
            schema_text: true,
            cells: &[9, 9, 9],
            ..Default::default()
        },
    );

    let report = compare_files(&a, &b, &CompareOptions::default()).unwrap();
    assert_eq!(report.data_sets_compared, 0);
    assert!(report
        .differences
        .iter()
        .all(|d| matches!(d, Difference::Schema { .. })));
    assert_eq!(report.differences.len(), 2);
}

#[test]
fn test_provenance_differences_are_scoped() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.calvin", Sample::default());
    let b = write(
        dir.path(),
        "b.calvin",
        Sample {
            parent_type: "grid",
            ..Default::default()
        },
    );

    let report = compare_files(&a, &b, &CompareOptions::default()).unwrap();
    assert_eq!(
        report.differences,
        vec![Difference::Metadata {
            scope: "metadata.parents[0]".into(),
            field: "file_type".into(),
            left: "scan".into(),
            right: "grid".into(),
        }]
    );
}

#[test]
fn test_integer_cells_ignore_epsilon() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.calvin", Sample::default());
    let b = write(
        dir.path(),
        "b.calvin",
        Sample {
            cells: &[1, 2, 4],
            ..Default::default()
        },
    );

    let options = CompareOptions::default().with_epsilon(10.0);
    let report = compare_files(&a, &b, &options).unwrap();
    let cells: Vec<_> = report
        .differences
        .iter()
        .filter_map(|d| match d {
            Difference::Cell { data_set, row, .. } => Some((data_set.as_str(), *row)),
            _ => None,
        })
        .collect();
    assert_eq!(cells, vec![("A", 2), ("B", 2)]);
}

/// Two float columns plus a float metadata parameter.
fn write_signals(dir: &Path, name: &str, a: &[f32], b: &[f32], het_rate: f32) -> PathBuf {
    let mut ds = DataSetHeader::new("Signals");
    ds.add_column(ColumnInfo::float("a")).unwrap();
    ds.add_column(ColumnInfo::float("b")).unwrap();
    ds.set_row_count(a.len() as u32).unwrap();
    let mut group = DataGroupHeader::new("Default");
    group.add_data_set(ds).unwrap();

    let mut metadata = GenericDataHeader::new("analysis");
    metadata.add_parameter(Parameter::new("het_rate", ParameterValue::Float(het_rate)));
    let mut header = FileHeader::new(metadata);
    header.add_group(group).unwrap();

    let path = dir.join(name);
    write_file(&path, header, |_, sink| {
        for (x, y) in a.iter().zip(b) {
            sink.write_row(&[ColumnValue::Float(*x), ColumnValue::Float(*y)])?;
        }
        Ok(())
    })
    .unwrap();
    path
}

fn cell_columns(differences: &[Difference]) -> Vec<usize> {
    differences
        .iter()
        .filter_map(|d| match d {
            Difference::Cell { column, .. } => Some(*column),
            _ => None,
        })
        .collect()
}

#[test]
fn test_epsilon_per_name() {
    let dir = TempDir::new().unwrap();
    let left = write_signals(dir.path(), "a.calvin", &[1.0, 2.0], &[1.0, 2.0], 0.25);
    let right = write_signals(dir.path(), "b.calvin", &[1.0, 2.0625], &[1.0625, 2.0], 0.28125);

    let strict = CompareOptions::default().with_epsilon(0.01);
    let report = compare_files(&left, &right, &strict).unwrap();
    assert_eq!(cell_columns(&report.differences), vec![0, 1]);
    assert!(report
        .differences
        .iter()
        .any(|d| matches!(d, Difference::Parameter { name, .. } if name == "het_rate")));

    let tuned = strict
        .with_epsilon_for("a", 0.1)
        .with_epsilon_for("Default/Signals/b", 0.1)
        .with_epsilon_for("het_rate", 0.05);
    let report = compare_files(&left, &right, &tuned).unwrap();
    assert!(report.is_equivalent(), "{}", report.to_json().unwrap());

    // A path override beats the bare column name
    let path_wins = tuned.with_epsilon_for("b", 0.1).with_epsilon_for("Default/Signals/b", 0.0);
    let report = compare_files(&left, &right, &path_wins).unwrap();
    assert_eq!(cell_columns(&report.differences), vec![1]);
}

#[test]
fn test_fractional_tolerance() {
    let dir = TempDir::new().unwrap();
    let values = [1000.0, 2000.0, 3000.0];
    let left = write_signals(dir.path(), "a.calvin", &values, &values, 0.5);
    let right = write_signals(
        dir.path(),
        "b.calvin",
        &[1000.5, 2001.0, 3001.5],
        &values,
        0.5,
    );

    let absolute = CompareOptions::default().with_epsilon(0.01);
    let report = compare_files(&left, &right, &absolute).unwrap();
    assert_eq!(cell_columns(&report.differences), vec![0, 0, 0]);

    let relative = absolute.clone().with_fraction(0.001);
    assert!(compare_files(&left, &right, &relative).unwrap().is_equivalent());

    let too_tight = absolute.with_fraction(0.0001);
    let report = compare_files(&left, &right, &too_tight).unwrap();
    assert_eq!(cell_columns(&report.differences), vec![0, 0, 0]);
}

#[test]
fn test_correlated_drift_is_accepted() {
    let dir = TempDir::new().unwrap();
    let base = [1.0, 2.0, 3.0, 4.0, 5.0];
    let left = write_signals(dir.path(), "a.calvin", &base, &base, 0.5);
    let right = write_signals(
        dir.path(),
        "b.calvin",
        &[1.5, 3.0, 4.5, 6.0, 7.5],
        &base,
        0.5,
    );

    let plain = CompareOptions::default();
    let report = compare_files(&left, &right, &plain).unwrap();
    assert_eq!(cell_columns(&report.differences), vec![0; 5]);

    let correlated = plain.with_correlation_cutoff(0.999);
    let report = compare_files(&left, &right, &correlated).unwrap();
    assert!(report.is_equivalent(), "{}", report.to_json().unwrap());
}

#[test]
fn test_uncorrelated_column_is_reported() {
    let dir = TempDir::new().unwrap();
    let base = [1.0, 2.0, 3.0, 4.0, 5.0];
    let left = write_signals(dir.path(), "a.calvin", &base, &base, 0.5);
    let right = write_signals(
        dir.path(),
        "b.calvin",
        &base,
        &[5.0, 1.0, 4.0, 2.0, 3.0],
        0.5,
    );

    let options = CompareOptions::default().with_correlation_cutoff(0.9999989);
    let report = compare_files(&left, &right, &options).unwrap();
    match report.differences.first() {
        Some(Difference::Correlation {
            column,
            correlation,
            cutoff,
            ..
        }) => {
            assert_eq!(*column, 1);
            assert!(*correlation < 0.5);
            assert_eq!(*cutoff, 0.9999989);
        }
        other => panic!("expected a correlation difference, got {:?}", other),
    }
    assert_eq!(cell_columns(&report.differences), vec![1, 1, 1, 1, 1]);
}

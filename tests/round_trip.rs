//! Write-then-read round trips of complete containers
//!
//! Covers every column kind, every parameter kind, provenance chains and
//! empty groups, then a proptest over generated trees written to memory.

use calvin_rs::{
    write_file, ColumnInfo, ColumnType, ColumnValue, DataGroupHeader, DataSetHeader, FileHeader,
    FileReader, FileWriter, GenericData, GenericDataHeader, Parameter, ParameterValue,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn every_column() -> DataSetHeader {
    let mut ds = DataSetHeader::new("Everything");
    ds.add_column(ColumnInfo::int8("i8")).unwrap();
    ds.add_column(ColumnInfo::uint8("u8")).unwrap();
    ds.add_column(ColumnInfo::int16("i16")).unwrap();
    ds.add_column(ColumnInfo::uint16("u16")).unwrap();
    ds.add_column(ColumnInfo::int32("i32")).unwrap();
    ds.add_column(ColumnInfo::uint32("u32")).unwrap();
    ds.add_column(ColumnInfo::float("f")).unwrap();
    ds.add_column(ColumnInfo::ascii("label", 10)).unwrap();
    ds.add_column(ColumnInfo::wide_text("unit", 4)).unwrap();
    ds.add_column(ColumnInfo::text("note", 12)).unwrap();
    ds.add_parameter(Parameter::new("Scale", ParameterValue::Float(0.5)))
        .unwrap();
    ds
}

fn row(n: i32) -> Vec<ColumnValue> {
    vec![
        ColumnValue::Int8(-(n as i8)),
        ColumnValue::UInt8(n as u8),
        ColumnValue::Int16(-300 * n as i16),
        ColumnValue::UInt16(60_000),
        ColumnValue::Int32(-70_000 * n),
        ColumnValue::UInt32(4_000_000_000),
        ColumnValue::Float(n as f32 / 4.0),
        ColumnValue::from(format!("AFFX-{}", n)),
        ColumnValue::from("µm"),
        ColumnValue::from("größe"),
    ]
}

fn provenance() -> GenericDataHeader {
    let mut scan = GenericDataHeader::new("scan");
    scan.set_file_id("11111111-2222-4333-8444-555555555555");
    scan.set_creation_time(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
    scan.add_parameter(Parameter::new("Scanner", ParameterValue::Ascii("S-7".into())));

    let mut grid = GenericDataHeader::new("grid");
    grid.set_locale("de-DE");
    grid.add_parent(scan);

    let mut intensities = GenericDataHeader::new("intensities");
    intensities.stamp_creation_time();
    intensities.set_locale("ja-JP");
    intensities.add_parameter(Parameter::new("Rows", ParameterValue::UInt16(4)));
    intensities.add_parameter(Parameter::new("Gain", ParameterValue::Int8(-3)));
    intensities.add_parameter(Parameter::new("Offset", ParameterValue::Int32(-12)));
    intensities.add_parameter(Parameter::new("Pixels", ParameterValue::UInt32(1 << 20)));
    intensities.add_parameter(Parameter::new("Flag", ParameterValue::UInt8(1)));
    intensities.add_parameter(Parameter::new("Delta", ParameterValue::Int16(-2)));
    intensities.add_parameter(Parameter::with_capacity(
        "Operator",
        ParameterValue::Text("Łukasz".into()),
        40,
    ));
    intensities.add_parent(Arc::new(grid));
    intensities
}

#[test]
fn test_full_tree_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("full.calvin");

    let mut everything = every_column();
    everything.set_row_count(4).unwrap();
    let mut empty = DataSetHeader::new("Empty");
    empty.add_column(ColumnInfo::float("x")).unwrap();

    let mut data = DataGroupHeader::new("Data");
    data.add_data_set(everything).unwrap();
    data.add_data_set(empty).unwrap();

    let mut header = FileHeader::new(provenance());
    header.add_group(data).unwrap();
    header.add_group(DataGroupHeader::new("Nothing")).unwrap();

    let written = write_file(&path, header, |ds, sink| {
        for n in 0..ds.row_count() {
            sink.write_row(&row(n as i32))?;
        }
        Ok(())
    })
    .unwrap();

    let reader = FileReader::open(&path).unwrap();
    assert_eq!(reader.header(), &written);
    assert_eq!(reader.file_len(), written.file_len());

    let metadata = reader.header().metadata();
    assert_eq!(metadata.locale(), "ja-JP");
    assert_eq!(metadata.file_id().len(), 36);
    assert!(metadata.creation_datetime().is_some());
    assert_eq!(
        metadata.find_parameter("Operator").and_then(Parameter::as_str),
        Some("Łukasz")
    );
    assert_eq!(
        metadata.find_parameter("Pixels").and_then(Parameter::as_u32),
        Some(1 << 20)
    );

    let scan = metadata.find_parent("scan").unwrap();
    assert_eq!(scan.file_id(), "11111111-2222-4333-8444-555555555555");
    assert_eq!(scan.creation_time(), "2020-01-02T03:04:05Z");
    assert_eq!(metadata.parents()[0].locale(), "de-DE");

    let data = GenericData::open(&path).unwrap();
    let mut plane = data.data_set("Data", "Everything").unwrap().unwrap();
    for n in 0..4 {
        assert_eq!(plane.row(n as u64).unwrap(), row(n));
    }
    assert_eq!(
        plane.header().find_parameter("Scale").and_then(Parameter::as_f32),
        Some(0.5)
    );
    assert_eq!(data.data_set_count("Nothing"), Some(0));
}

#[test]
fn test_json_dump_names_the_tree() {
    let mut ds = every_column();
    ds.set_row_count(1).unwrap();
    let mut group = DataGroupHeader::new("Data");
    group.add_data_set(ds).unwrap();
    let mut header = FileHeader::new(provenance());
    header.add_group(group).unwrap();

    let json = header.to_json_pretty().unwrap();
    assert!(json.contains("\"Everything\""));
    assert!(json.contains("\"grid\""));
    assert!(json.contains("\"Operator\""));
}

fn column_for(kind: u8, index: usize) -> ColumnInfo {
    let name = format!("c{}", index);
    match kind % 10 {
        0 => ColumnInfo::int8(name),
        1 => ColumnInfo::uint8(name),
        2 => ColumnInfo::int16(name),
        3 => ColumnInfo::uint16(name),
        4 => ColumnInfo::int32(name),
        5 => ColumnInfo::uint32(name),
        6 => ColumnInfo::float(name),
        7 => ColumnInfo::ascii(name, 8),
        8 => ColumnInfo::wide_text(name, 8),
        _ => ColumnInfo::text(name, 8),
    }
}

fn value_for(column: &ColumnInfo, row: u32, col: usize, seed: u64) -> ColumnValue {
    let n = seed.wrapping_add(u64::from(row) * 31 + col as u64);
    match column.column_type {
        ColumnType::Int8 => ColumnValue::Int8(n as i8),
        ColumnType::UInt8 => ColumnValue::UInt8(n as u8),
        ColumnType::Int16 => ColumnValue::Int16(n as i16),
        ColumnType::UInt16 => ColumnValue::UInt16(n as u16),
        ColumnType::Int32 => ColumnValue::Int32(n as i32),
        ColumnType::UInt32 => ColumnValue::UInt32(n as u32),
        ColumnType::Float => ColumnValue::Float((n % 100_000) as f32 * 0.25),
        ColumnType::Ascii { .. } | ColumnType::WideText { .. } | ColumnType::Text { .. } => {
            ColumnValue::Text(format!("r{}c{}", row, col))
        }
    }
}

prop_compose! {
    fn arb_tree()(
        groups in prop::collection::vec(
            prop::collection::vec(
                (prop::collection::vec(0u8..10, 1..6), 0u32..12),
                0..3,
            ),
            0..3,
        ),
        file_type in "[a-z]{1,12}",
        param in any::<i32>(),
    ) -> FileHeader {
        let mut metadata = GenericDataHeader::new(file_type);
        metadata.add_parameter(Parameter::new("p", ParameterValue::Int32(param)));
        let mut header = FileHeader::new(metadata);

        for (g, sets) in groups.into_iter().enumerate() {
            let mut group = DataGroupHeader::new(format!("g{}", g));
            for (d, (kinds, rows)) in sets.into_iter().enumerate() {
                let mut ds = DataSetHeader::new(format!("d{}", d));
                for (c, kind) in kinds.into_iter().enumerate() {
                    ds.add_column(column_for(kind, c)).unwrap();
                }
                ds.set_row_count(rows).unwrap();
                group.add_data_set(ds).unwrap();
            }
            header.add_group(group).unwrap();
        }
        header
    }
}

proptest! {
    #[test]
    fn prop_written_image_parses_back(header in arb_tree(), seed in any::<u64>()) {
        let mut writer = FileWriter::new(Vec::new(), header).unwrap();
        let laid_out = writer.header().clone();

        for _ in 0..laid_out.data_set_total() {
            let mut sink = writer.next_data_set().unwrap();
            let ds = sink.header().unwrap().clone();
            for r in 0..ds.row_count() {
                let values: Vec<ColumnValue> = ds
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(c, column)| value_for(column, r, c, seed))
                    .collect();
                sink.write_row(&values).unwrap();
            }
            sink.finish().unwrap();
        }
        let bytes = writer.finish().unwrap();

        prop_assert_eq!(bytes.len() as u64, laid_out.file_len());
        let parsed = FileHeader::from_bytes(&bytes).unwrap();
        prop_assert_eq!(&parsed, &laid_out);

        for (_, ds) in parsed.data_sets() {
            let width = ds.row_width();
            for r in 0..ds.row_count() {
                let start = (ds.data_start() + u64::from(r) * width as u64) as usize;
                let values = ds.decode_row(&bytes[start..start + width]).unwrap();
                for (c, (column, value)) in ds.columns().iter().zip(values).enumerate() {
                    prop_assert_eq!(value, value_for(column, r, c, seed));
                }
            }
        }
    }
}

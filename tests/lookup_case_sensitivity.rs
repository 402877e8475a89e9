//! Name lookups are exact and case-sensitive at every level

use calvin_rs::{
    write_file, CalvinError, ColumnInfo, ColumnValue, DataGroupHeader, DataSetHeader, FileHeader,
    GenericData, GenericDataHeader, Parameter, ParameterValue,
};
use tempfile::TempDir;

fn header() -> FileHeader {
    let mut ds = DataSetHeader::new("Intensity");
    ds.add_column(ColumnInfo::uint16("v")).unwrap();
    ds.set_row_count(1).unwrap();
    ds.add_parameter(Parameter::new("Units", ParameterValue::Ascii("counts".into())))
        .unwrap();

    let mut lower = DataSetHeader::new("intensity");
    lower.add_column(ColumnInfo::uint16("v")).unwrap();
    lower.set_row_count(1).unwrap();

    let mut group = DataGroupHeader::new("Results");
    group.add_data_set(ds).unwrap();
    group.add_data_set(lower).unwrap();

    let mut metadata = GenericDataHeader::new("lookup");
    metadata.add_parameter(Parameter::new("Operator", ParameterValue::Text("ann".into())));
    let mut header = FileHeader::new(metadata);
    header.add_group(group).unwrap();
    header
}

#[test]
fn test_names_differing_only_in_case_are_distinct() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lookup.calvin");
    write_file(&path, header(), |ds, sink| {
        let v = if ds.name() == "Intensity" { 1 } else { 2 };
        sink.write_row(&[ColumnValue::UInt16(v)])
    })
    .unwrap();

    let data = GenericData::open(&path).unwrap();
    assert!(data.find_data_group_header("Results").is_some());
    assert!(data.find_data_group_header("results").is_none());
    assert!(data.find_data_group_header("RESULTS").is_none());
    assert!(data.find_data_group_header("Result").is_none());

    let mut upper = data.data_set("Results", "Intensity").unwrap().unwrap();
    let mut lower = data.data_set("Results", "intensity").unwrap().unwrap();
    assert_eq!(upper.get::<u16>(0, 0).unwrap(), 1);
    assert_eq!(lower.get::<u16>(0, 0).unwrap(), 2);
    assert!(data.data_set("Results", "INTENSITY").unwrap().is_none());
    assert!(data.data_set("results", "Intensity").unwrap().is_none());

    let ds = data.find_data_set_header("Results", "Intensity").unwrap();
    assert!(ds.find_parameter("Units").is_some());
    assert!(ds.find_parameter("units").is_none());

    let metadata = data.header().metadata();
    assert!(metadata.find_parameter("Operator").is_some());
    assert!(metadata.find_parameter("operator").is_none());
}

#[test]
fn test_exact_duplicates_are_rejected() {
    let mut header = header();
    assert!(matches!(
        header.add_group(DataGroupHeader::new("Results")),
        Err(CalvinError::DuplicateName(_))
    ));
    assert!(header.add_group(DataGroupHeader::new("results")).is_ok());

    let group = header.find_group_mut("Results").unwrap();
    assert!(matches!(
        group.add_data_set(DataSetHeader::new("Intensity")),
        Err(CalvinError::DuplicateName(_))
    ));
}

#[test]
fn test_rename_cannot_shadow_a_sibling() {
    let mut header = header();
    let group = header.find_group_mut("Results").unwrap();
    group.add_data_set(DataSetHeader::new("Background")).unwrap();

    assert!(matches!(
        group.rename_data_set("Background", "Intensity"),
        Err(CalvinError::DuplicateName(_))
    ));
    assert!(matches!(
        group.rename_data_set("Background", "intensity"),
        Err(CalvinError::DuplicateName(_))
    ));
    assert!(group.rename_data_set("Background", "INTENSITY").unwrap());
    assert_eq!(group.find_data_set_index("Intensity"), Some(0));
    assert_eq!(group.find_data_set_index("intensity"), Some(1));
    assert_eq!(group.find_data_set_index("INTENSITY"), Some(2));
}

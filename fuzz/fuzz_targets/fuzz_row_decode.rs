#![no_main]
use calvin_rs::{ColumnInfo, ColumnType, DataSetHeader};
use libfuzzer_sys::fuzz_target;

// First byte picks the text column width; the rest is treated as one row
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let max_len = u32::from(data[0] % 16);

    let mut ds = DataSetHeader::new("fuzz");
    for column in [
        ColumnInfo::int16("i16"),
        ColumnInfo::new("ascii", ColumnType::Ascii { max_len }),
        ColumnInfo::new("wide", ColumnType::WideText { max_len }),
        ColumnInfo::new("text", ColumnType::Text { max_len }),
    ] {
        let _ = ds.add_column(column);
    }

    let row = &data[1..];
    if row.len() != ds.row_width() {
        return;
    }
    if let Ok(values) = ds.decode_row(row) {
        // Whatever decodes must encode back to a row of the same width
        let encoded = ds.encode_row(&values).unwrap();
        assert_eq!(encoded.len(), row.len());
    }
});

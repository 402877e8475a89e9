//! Dataset headers: a named table schema with a fixed row width.

use crate::core::codec::{str16_len, ReadExt, WriteExt, MAX_PREALLOC};
use crate::core::column::{ColumnInfo, ColumnType, ColumnValue};
use crate::core::error::{CalvinError, Result};
use crate::core::param::{Parameter, ParameterList};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Schema of one dataset.
///
/// The schema is editable while the header is being composed. Once a writer
/// has laid the file out, or a reader has parsed it, the header is frozen:
/// columns, row count, name and parameters can no longer change because the
/// bytes describing them are already on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSetHeader {
    name: String,
    params: ParameterList,
    columns: Vec<ColumnInfo>,
    row_count: u32,

    /// Absolute file offset of the first row. Assigned by the writer.
    data_start: u64,

    #[serde(skip)]
    frozen: bool,
}

impl DataSetHeader {
    pub fn new(name: impl Into<String>) -> Self {
        DataSetHeader {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public renames go through `DataGroupHeader::rename_data_set`, which
    /// keeps sibling names distinct.
    pub(crate) fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.name = name.into();
        Ok(())
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    pub fn set_row_count(&mut self, rows: u32) -> Result<()> {
        self.ensure_mutable()?;
        self.row_count = rows;
        Ok(())
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Result<&ColumnInfo> {
        self.columns.get(index).ok_or(CalvinError::ColumnOutOfRange {
            column: index,
            columns: self.columns.len(),
        })
    }

    /// Append a column. Fails once the schema is frozen.
    pub fn add_column(&mut self, column: ColumnInfo) -> Result<()> {
        self.ensure_mutable()?;
        self.columns.push(column);
        Ok(())
    }

    /// Shorthand for `add_column(ColumnInfo::new(name, column_type))`.
    pub fn add_column_of(&mut self, name: impl Into<String>, column_type: ColumnType) -> Result<()> {
        self.add_column(ColumnInfo::new(name, column_type))
    }

    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<()> {
        self.ensure_mutable()?;
        self.params.push(parameter);
        Ok(())
    }

    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.find(name)
    }

    /// Bytes per row: the sum of the column widths.
    pub fn row_width(&self) -> usize {
        self.columns.iter().map(ColumnInfo::byte_width).sum()
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Length of the data region: `row_count * row_width`.
    pub fn data_len(&self) -> u64 {
        u64::from(self.row_count).saturating_mul(self.row_width() as u64)
    }

    /// Absolute file offset of `row`.
    pub fn row_offset(&self, row: u64) -> Result<u64> {
        self.check_row(row)?;
        Ok(self.data_start + row * self.row_width() as u64)
    }

    /// Offset of column `column` within a row.
    pub fn column_offset(&self, column: usize) -> Result<usize> {
        self.column(column)?;
        Ok(self.columns[..column].iter().map(ColumnInfo::byte_width).sum())
    }

    pub fn check_row(&self, row: u64) -> Result<()> {
        if row >= u64::from(self.row_count) {
            return Err(CalvinError::RowOutOfRange {
                row,
                rows: u64::from(self.row_count),
            });
        }
        Ok(())
    }

    /// Encode a full row in schema order.
    pub fn encode_row(&self, values: &[ColumnValue]) -> Result<Vec<u8>> {
        if values.len() != self.columns.len() {
            return Err(CalvinError::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }

        let mut row = vec![0u8; self.row_width()];
        let mut pos = 0;
        for (index, (column, value)) in self.columns.iter().zip(values).enumerate() {
            let width = column.byte_width();
            column
                .column_type
                .encode(value, index, &mut row[pos..pos + width])?;
            pos += width;
        }
        Ok(row)
    }

    pub fn decode_row(&self, row: &[u8]) -> Result<Vec<ColumnValue>> {
        self.check_row_width(row)?;

        let mut values = Vec::with_capacity(self.columns.len());
        let mut pos = 0;
        for column in &self.columns {
            let width = column.byte_width();
            values.push(column.column_type.decode(&row[pos..pos + width])?);
            pos += width;
        }
        Ok(values)
    }

    /// Decode a single cell out of an encoded row.
    pub fn decode_value(&self, row: &[u8], column: usize) -> Result<ColumnValue> {
        self.check_row_width(row)?;
        let start = self.column_offset(column)?;
        let info = &self.columns[column];
        info.column_type
            .decode(&row[start..start + info.byte_width()])
    }

    pub fn check_row_width(&self, row: &[u8]) -> Result<()> {
        if row.len() != self.row_width() {
            return Err(CalvinError::RowWidthMismatch {
                expected: self.row_width(),
                actual: row.len(),
            });
        }
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub(crate) fn set_data_start(&mut self, offset: u64) {
        self.data_start = offset;
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(CalvinError::SchemaFrozen(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        let columns: u64 = self
            .columns
            .iter()
            .map(|c| str16_len(&c.name) + 1 + 4)
            .sum();
        4 + str16_len(&self.name) + self.params.encoded_len() + 4 + columns + 4
    }

    pub(crate) fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let data_start =
            u32::try_from(self.data_start).map_err(|_| CalvinError::OffsetOverflow(self.data_start))?;
        out.write_u32_be(data_start)?;
        out.write_str16(&self.name)?;
        self.params.write_to(out)?;

        out.write_len(self.columns.len())?;
        for column in &self.columns {
            let width = column.byte_width();
            out.write_str16(&column.name)?;
            out.write_u8_be(column.column_type.tag())?;
            out.write_u32_be(
                u32::try_from(width).map_err(|_| CalvinError::OffsetOverflow(width as u64))?,
            )?;
        }

        out.write_u32_be(self.row_count)
    }

    /// Parse one dataset block. The result is frozen.
    pub(crate) fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let data_start = u64::from(input.read_u32_be()?);
        let name = input.read_str16()?;
        let params = ParameterList::read_from(input)?;

        let column_count = input.read_u32_be()? as usize;
        let mut columns = Vec::with_capacity(column_count.min(MAX_PREALLOC));
        for _ in 0..column_count {
            let column_name = input.read_str16()?;
            let tag = input.read_u8_be()?;
            let width = input.read_u32_be()?;
            columns.push(ColumnInfo::new(column_name, ColumnType::from_tag(tag, width)?));
        }

        let row_count = input.read_u32_be()?;

        Ok(DataSetHeader {
            name,
            params,
            columns,
            row_count,
            data_start,
            frozen: true,
        })
    }
}

/// Headers are equal when their schema and contents are; the assigned
/// offset and the frozen flag are bookkeeping.
impl PartialEq for DataSetHeader {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.row_count == other.row_count
            && self.params == other.params
    }
}

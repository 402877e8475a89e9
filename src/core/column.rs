//! Column schemas and cell encodings.
//!
//! Every column kind is a variant of [`ColumnType`] carrying its own width
//! rule and its own encode/decode. Cells are fixed width, so a row is the
//! concatenation of its cells and every row of a dataset has the same size.
//!
//! | tag | kind            | width          |
//! |-----|-----------------|----------------|
//! | 0   | i8              | 1              |
//! | 1   | u8              | 1              |
//! | 2   | i16             | 2              |
//! | 3   | u16             | 2              |
//! | 4   | i32             | 4              |
//! | 5   | u32             | 4              |
//! | 6   | f32             | 4              |
//! | 7   | ASCII text      | 4 + max_len    |
//! | 8   | UTF-16 text     | 4 + 2*max_len  |
//! | 9   | UTF-8 text      | 4 + max_len    |
//!
//! Text cells start with a big-endian u32 length (bytes, or code units for
//! UTF-16) and are zero padded to the slot size.

use crate::core::codec::{decode_utf16_be, encode_utf16_be};
use crate::core::error::{CalvinError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the length prefix in front of every text cell.
const TEXT_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float,
    /// Fixed-width ASCII text of at most `max_len` bytes
    Ascii { max_len: u32 },
    /// Fixed-width UTF-16 text of at most `max_len` code units
    WideText { max_len: u32 },
    /// Any UTF-8 text of at most `max_len` bytes
    Text { max_len: u32 },
}

impl ColumnType {
    pub fn tag(&self) -> u8 {
        match self {
            ColumnType::Int8 => 0,
            ColumnType::UInt8 => 1,
            ColumnType::Int16 => 2,
            ColumnType::UInt16 => 3,
            ColumnType::Int32 => 4,
            ColumnType::UInt32 => 5,
            ColumnType::Float => 6,
            ColumnType::Ascii { .. } => 7,
            ColumnType::WideText { .. } => 8,
            ColumnType::Text { .. } => 9,
        }
    }

    /// Bytes one cell of this kind occupies in a row.
    pub fn byte_width(&self) -> usize {
        match self {
            ColumnType::Int8 | ColumnType::UInt8 => 1,
            ColumnType::Int16 | ColumnType::UInt16 => 2,
            ColumnType::Int32 | ColumnType::UInt32 | ColumnType::Float => 4,
            ColumnType::Ascii { max_len } | ColumnType::Text { max_len } => {
                TEXT_PREFIX + *max_len as usize
            }
            ColumnType::WideText { max_len } => TEXT_PREFIX + 2 * *max_len as usize,
        }
    }

    /// Rebuild a column kind from its stored tag and byte width.
    pub fn from_tag(tag: u8, width: u32) -> Result<Self> {
        let width = width as usize;
        let column_type = match tag {
            0 => ColumnType::Int8,
            1 => ColumnType::UInt8,
            2 => ColumnType::Int16,
            3 => ColumnType::UInt16,
            4 => ColumnType::Int32,
            5 => ColumnType::UInt32,
            6 => ColumnType::Float,
            7 | 9 if width >= TEXT_PREFIX => {
                let max_len = (width - TEXT_PREFIX) as u32;
                if tag == 7 {
                    ColumnType::Ascii { max_len }
                } else {
                    ColumnType::Text { max_len }
                }
            }
            8 if width >= TEXT_PREFIX && (width - TEXT_PREFIX) % 2 == 0 => ColumnType::WideText {
                max_len: ((width - TEXT_PREFIX) / 2) as u32,
            },
            _ => return Err(CalvinError::InvalidColumnType(tag)),
        };

        // A scalar tag stored with the wrong width is as bad as an unknown tag
        if column_type.byte_width() != width {
            return Err(CalvinError::InvalidColumnType(tag));
        }
        Ok(column_type)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Int8 => "int8",
            ColumnType::UInt8 => "uint8",
            ColumnType::Int16 => "int16",
            ColumnType::UInt16 => "uint16",
            ColumnType::Int32 => "int32",
            ColumnType::UInt32 => "uint32",
            ColumnType::Float => "float",
            ColumnType::Ascii { .. } => "ascii",
            ColumnType::WideText { .. } => "wide-text",
            ColumnType::Text { .. } => "text",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ColumnType::Ascii { .. } | ColumnType::WideText { .. } | ColumnType::Text { .. }
        )
    }

    /// Encode `value` into `out`, which must be exactly one cell wide.
    ///
    /// `column` is only used to label errors.
    pub fn encode(&self, value: &ColumnValue, column: usize, out: &mut [u8]) -> Result<()> {
        debug_assert_eq!(out.len(), self.byte_width());

        let mismatch = || CalvinError::TypeMismatch {
            column,
            expected: self.name().to_string(),
            actual: value.kind_name().to_string(),
        };

        match (self, value) {
            (ColumnType::Int8, ColumnValue::Int8(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::UInt8, ColumnValue::UInt8(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::Int16, ColumnValue::Int16(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::UInt16, ColumnValue::UInt16(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::Int32, ColumnValue::Int32(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::UInt32, ColumnValue::UInt32(v)) => out.copy_from_slice(&v.to_be_bytes()),
            (ColumnType::Float, ColumnValue::Float(v)) => {
                out.copy_from_slice(&v.to_bits().to_be_bytes())
            }
            (ColumnType::Ascii { max_len }, ColumnValue::Text(s)) => {
                if !s.is_ascii() {
                    return Err(mismatch());
                }
                write_text(s.as_bytes(), s.len(), *max_len as usize, out)?;
            }
            (ColumnType::Text { max_len }, ColumnValue::Text(s)) => {
                write_text(s.as_bytes(), s.len(), *max_len as usize, out)?;
            }
            (ColumnType::WideText { max_len }, ColumnValue::Text(s)) => {
                let units = encode_utf16_be(s);
                write_text(&units, units.len() / 2, *max_len as usize, out)?;
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Decode one cell.
    pub fn decode(&self, cell: &[u8]) -> Result<ColumnValue> {
        if cell.len() != self.byte_width() {
            return Err(CalvinError::RowWidthMismatch {
                expected: self.byte_width(),
                actual: cell.len(),
            });
        }

        let value = match self {
            ColumnType::Int8 => ColumnValue::Int8(cell[0] as i8),
            ColumnType::UInt8 => ColumnValue::UInt8(cell[0]),
            ColumnType::Int16 => ColumnValue::Int16(i16::from_be_bytes([cell[0], cell[1]])),
            ColumnType::UInt16 => ColumnValue::UInt16(u16::from_be_bytes([cell[0], cell[1]])),
            ColumnType::Int32 => ColumnValue::Int32(i32::from_be_bytes(word(cell))),
            ColumnType::UInt32 => ColumnValue::UInt32(u32::from_be_bytes(word(cell))),
            ColumnType::Float => ColumnValue::Float(f32::from_bits(u32::from_be_bytes(word(cell)))),
            ColumnType::Ascii { max_len } => {
                let bytes = read_text(cell, 1, *max_len as usize)?;
                if !bytes.is_ascii() {
                    return Err(CalvinError::InvalidString(
                        "non-ASCII byte in ASCII column".to_string(),
                    ));
                }
                ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
            ColumnType::Text { max_len } => {
                let bytes = read_text(cell, 1, *max_len as usize)?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| CalvinError::InvalidString(e.to_string()))?;
                ColumnValue::Text(text)
            }
            ColumnType::WideText { max_len } => {
                let bytes = read_text(cell, 2, *max_len as usize)?;
                ColumnValue::Text(decode_utf16_be(bytes)?)
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Ascii { max_len }
            | ColumnType::WideText { max_len }
            | ColumnType::Text { max_len } => write!(f, "{}({})", self.name(), max_len),
            _ => f.write_str(self.name()),
        }
    }
}

fn word(cell: &[u8]) -> [u8; 4] {
    [cell[0], cell[1], cell[2], cell[3]]
}

fn write_text(payload: &[u8], len: usize, max_len: usize, out: &mut [u8]) -> Result<()> {
    if len > max_len {
        return Err(CalvinError::StringTooLong { len, max: max_len });
    }
    out.fill(0);
    out[..TEXT_PREFIX].copy_from_slice(&(len as u32).to_be_bytes());
    out[TEXT_PREFIX..TEXT_PREFIX + payload.len()].copy_from_slice(payload);
    Ok(())
}

fn read_text(cell: &[u8], unit: usize, max_len: usize) -> Result<&[u8]> {
    let len = u32::from_be_bytes(word(cell)) as usize;
    if len > max_len {
        return Err(CalvinError::InvalidString(format!(
            "text cell claims {} units, slot holds {}",
            len, max_len
        )));
    }
    Ok(&cell[TEXT_PREFIX..TEXT_PREFIX + len * unit])
}

/// One column of a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnInfo {
            name: name.into(),
            column_type,
        }
    }

    pub fn int8(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int8)
    }

    pub fn uint8(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt8)
    }

    pub fn int16(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int16)
    }

    pub fn uint16(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt16)
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int32)
    }

    pub fn uint32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt32)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn ascii(name: impl Into<String>, max_len: u32) -> Self {
        Self::new(name, ColumnType::Ascii { max_len })
    }

    pub fn wide_text(name: impl Into<String>, max_len: u32) -> Self {
        Self::new(name, ColumnType::WideText { max_len })
    }

    pub fn text(name: impl Into<String>, max_len: u32) -> Self {
        Self::new(name, ColumnType::Text { max_len })
    }

    pub fn byte_width(&self) -> usize {
        self.column_type.byte_width()
    }
}

/// A decoded cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float(f32),
    Text(String),
}

impl ColumnValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ColumnValue::Int8(_) => "int8",
            ColumnValue::UInt8(_) => "uint8",
            ColumnValue::Int16(_) => "int16",
            ColumnValue::UInt16(_) => "uint16",
            ColumnValue::Int32(_) => "int32",
            ColumnValue::UInt32(_) => "uint32",
            ColumnValue::Float(_) => "float",
            ColumnValue::Text(_) => "text",
        }
    }

    /// Numeric view used for tolerant comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int8(v) => Some(f64::from(*v)),
            ColumnValue::UInt8(v) => Some(f64::from(*v)),
            ColumnValue::Int16(v) => Some(f64::from(*v)),
            ColumnValue::UInt16(v) => Some(f64::from(*v)),
            ColumnValue::Int32(v) => Some(f64::from(*v)),
            ColumnValue::UInt32(v) => Some(f64::from(*v)),
            ColumnValue::Float(v) => Some(f64::from(*v)),
            ColumnValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int8(v) => write!(f, "{}", v),
            ColumnValue::UInt8(v) => write!(f, "{}", v),
            ColumnValue::Int16(v) => write!(f, "{}", v),
            ColumnValue::UInt16(v) => write!(f, "{}", v),
            ColumnValue::Int32(v) => write!(f, "{}", v),
            ColumnValue::UInt32(v) => write!(f, "{}", v),
            ColumnValue::Float(v) => write!(f, "{}", v),
            ColumnValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Typed extraction of a decoded cell.
pub trait FromColumn: Sized {
    fn from_column(value: ColumnValue) -> Option<Self>;
}

macro_rules! scalar_cell {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for ColumnValue {
            fn from(v: $ty) -> Self {
                ColumnValue::$variant(v)
            }
        }

        impl FromColumn for $ty {
            fn from_column(value: ColumnValue) -> Option<Self> {
                match value {
                    ColumnValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_cell!(i8, Int8);
scalar_cell!(u8, UInt8);
scalar_cell!(i16, Int16);
scalar_cell!(u16, UInt16);
scalar_cell!(i32, Int32);
scalar_cell!(u32, UInt32);
scalar_cell!(f32, Float);
scalar_cell!(String, Text);

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

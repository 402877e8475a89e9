//! Typed name/value parameters attached to datasets and metadata blocks.
//!
//! On disk a parameter is `str16 name, blob value, str16 mime_type`. The
//! MIME type selects the value encoding. Scalars occupy a 4-byte blob,
//! right-aligned big-endian; text occupies its encoded bytes plus any
//! reserved capacity, zero padded.

use crate::core::codec::{blob_len, decode_utf16_be, encode_utf16_be, str16_len, ReadExt, WriteExt};
use crate::core::error::{CalvinError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const MIME_INT8: &str = "text/x-calvin-integer-8";
pub const MIME_UINT8: &str = "text/x-calvin-unsigned-integer-8";
pub const MIME_INT16: &str = "text/x-calvin-integer-16";
pub const MIME_UINT16: &str = "text/x-calvin-unsigned-integer-16";
pub const MIME_INT32: &str = "text/x-calvin-integer-32";
pub const MIME_UINT32: &str = "text/x-calvin-unsigned-integer-32";
pub const MIME_FLOAT: &str = "text/x-calvin-float";
pub const MIME_ASCII: &str = "text/ascii";
pub const MIME_TEXT: &str = "text/plain";

const SCALAR_BLOB: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float(f32),
    /// Single-byte text
    Ascii(String),
    /// UTF-16 text
    Text(String),
}

impl ParameterValue {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ParameterValue::Int8(_) => MIME_INT8,
            ParameterValue::UInt8(_) => MIME_UINT8,
            ParameterValue::Int16(_) => MIME_INT16,
            ParameterValue::UInt16(_) => MIME_UINT16,
            ParameterValue::Int32(_) => MIME_INT32,
            ParameterValue::UInt32(_) => MIME_UINT32,
            ParameterValue::Float(_) => MIME_FLOAT,
            ParameterValue::Ascii(_) => MIME_ASCII,
            ParameterValue::Text(_) => MIME_TEXT,
        }
    }

    /// Value bytes before any capacity padding.
    fn payload(&self) -> Vec<u8> {
        let mut scalar = [0u8; SCALAR_BLOB];
        match self {
            ParameterValue::Int8(v) => scalar[3..].copy_from_slice(&v.to_be_bytes()),
            ParameterValue::UInt8(v) => scalar[3..].copy_from_slice(&v.to_be_bytes()),
            ParameterValue::Int16(v) => scalar[2..].copy_from_slice(&v.to_be_bytes()),
            ParameterValue::UInt16(v) => scalar[2..].copy_from_slice(&v.to_be_bytes()),
            ParameterValue::Int32(v) => scalar.copy_from_slice(&v.to_be_bytes()),
            ParameterValue::UInt32(v) => scalar.copy_from_slice(&v.to_be_bytes()),
            ParameterValue::Float(v) => scalar.copy_from_slice(&v.to_bits().to_be_bytes()),
            ParameterValue::Ascii(s) => return s.as_bytes().to_vec(),
            ParameterValue::Text(s) => return encode_utf16_be(s),
        }
        scalar.to_vec()
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ParameterValue::Ascii(_) | ParameterValue::Text(_))
    }

    /// Same MIME type, regardless of value.
    pub fn same_kind(&self, other: &ParameterValue) -> bool {
        self.mime_type() == other.mime_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    /// Reserved blob size in bytes for text values. The stored blob is
    /// never shorter than the encoded value.
    #[serde(default)]
    pub capacity: usize,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Parameter {
            name: name.into(),
            value,
            capacity: 0,
        }
    }

    /// A parameter whose text blob reserves `capacity` bytes, leaving room
    /// for longer values to be rewritten in place later.
    pub fn with_capacity(name: impl Into<String>, value: ParameterValue, capacity: usize) -> Self {
        Parameter {
            name: name.into(),
            value,
            capacity,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.value.mime_type()
    }

    /// Encoded blob, including capacity padding for text.
    pub fn encode_value(&self) -> Vec<u8> {
        let mut blob = self.value.payload();
        if self.value.is_text() && blob.len() < self.capacity {
            blob.resize(self.capacity, 0);
        }
        blob
    }

    /// Rebuild a parameter from its stored fields.
    pub fn decode(name: impl Into<String>, blob: &[u8], mime: &str) -> Result<Self> {
        let name = name.into();
        let scalar = || -> Result<[u8; SCALAR_BLOB]> {
            blob.try_into().map_err(|_| {
                CalvinError::InvalidString(format!(
                    "{} value must be {} bytes, found {}",
                    mime,
                    SCALAR_BLOB,
                    blob.len()
                ))
            })
        };

        let mut padded = false;
        let value = match mime {
            MIME_INT8 => ParameterValue::Int8(scalar()?[3] as i8),
            MIME_UINT8 => ParameterValue::UInt8(scalar()?[3]),
            MIME_INT16 => {
                let b = scalar()?;
                ParameterValue::Int16(i16::from_be_bytes([b[2], b[3]]))
            }
            MIME_UINT16 => {
                let b = scalar()?;
                ParameterValue::UInt16(u16::from_be_bytes([b[2], b[3]]))
            }
            MIME_INT32 => ParameterValue::Int32(i32::from_be_bytes(scalar()?)),
            MIME_UINT32 => ParameterValue::UInt32(u32::from_be_bytes(scalar()?)),
            MIME_FLOAT => ParameterValue::Float(f32::from_bits(u32::from_be_bytes(scalar()?))),
            MIME_ASCII => {
                let end = blob.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                padded = end < blob.len();
                if !blob[..end].is_ascii() {
                    return Err(non_ascii(&name));
                }
                ParameterValue::Ascii(String::from_utf8_lossy(&blob[..end]).into_owned())
            }
            MIME_TEXT => {
                if blob.len() % 2 != 0 {
                    return Err(CalvinError::InvalidString(format!(
                        "UTF-16 value has odd length {}",
                        blob.len()
                    )));
                }
                let mut end = blob.len();
                while end >= 2 && blob[end - 2] == 0 && blob[end - 1] == 0 {
                    end -= 2;
                }
                padded = end < blob.len();
                ParameterValue::Text(decode_utf16_be(&blob[..end])?)
            }
            other => return Err(CalvinError::InvalidMimeType(other.to_string())),
        };

        let capacity = if padded { blob.len() } else { 0 };
        Ok(Parameter {
            name,
            value,
            capacity,
        })
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self.value {
            ParameterValue::Int8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value {
            ParameterValue::UInt8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self.value {
            ParameterValue::Int16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.value {
            ParameterValue::UInt16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.value {
            ParameterValue::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self.value {
            ParameterValue::UInt32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.value {
            ParameterValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Text of either an ASCII or a UTF-16 parameter.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Ascii(s) | ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        str16_len(&self.name) + blob_len(self.encode_value().len()) + str16_len(self.mime_type())
    }

    /// Fails for an ASCII value holding non-ASCII characters.
    pub fn check(&self) -> Result<()> {
        match &self.value {
            ParameterValue::Ascii(s) if !s.is_ascii() => Err(non_ascii(&self.name)),
            _ => Ok(()),
        }
    }

    pub(crate) fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        self.check()?;
        out.write_str16(&self.name)?;
        out.write_blob(&self.encode_value())?;
        out.write_str16(self.mime_type())
    }

    pub(crate) fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let name = input.read_str16()?;
        let blob = input.read_blob()?;
        let mime = input.read_str16()?;
        Parameter::decode(name, &blob, &mime)
    }
}

fn non_ascii(name: &str) -> CalvinError {
    CalvinError::InvalidString(format!("non-ASCII byte in ASCII parameter {}", name))
}

/// Parameters compare by what they store: name, value and blob size.
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.encode_value().len() == other.encode_value().len()
    }
}

/// Ordered parameter list. Names are matched exactly and case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterList(Vec<Parameter>);

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.0.push(parameter);
    }

    /// First parameter named exactly `name`.
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Parameter> {
        self.0.get_mut(index)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.0.iter_mut().find(|p| p.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        4 + self.0.iter().map(Parameter::encoded_len).sum::<u64>()
    }

    pub(crate) fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_len(self.0.len())?;
        for parameter in &self.0 {
            parameter.write_to(out)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let count = input.read_u32_be()? as usize;
        let mut list = Vec::with_capacity(count.min(crate::core::codec::MAX_PREALLOC));
        for _ in 0..count {
            list.push(Parameter::read_from(input)?);
        }
        Ok(ParameterList(list))
    }
}

impl<'a> IntoIterator for &'a ParameterList {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Parameter> for ParameterList {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        ParameterList(iter.into_iter().collect())
    }
}

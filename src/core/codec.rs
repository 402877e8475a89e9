//! Big-endian primitives shared by the header reader, the writer and the
//! updaters.
//!
//! Three string shapes appear in the container:
//!
//! - `str8`: u32 byte count followed by the bytes
//! - `str16`: u32 UTF-16 code-unit count followed by big-endian code units
//! - `blob`: u32 byte count followed by opaque bytes

use crate::core::error::{CalvinError, Result};
use std::io::{ErrorKind, Read, Write};

/// Upper bound on a decoded string, in code units.
pub(crate) const MAX_STRING_UNITS: usize = 1 << 20;

/// Upper bound on a parameter blob, in bytes.
pub(crate) const MAX_BLOB_BYTES: usize = 1 << 24;

/// Bound on pre-allocation driven by counts read from untrusted bytes.
pub(crate) const MAX_PREALLOC: usize = 1024;

fn map_eof(e: std::io::Error) -> CalvinError {
    if e.kind() == ErrorKind::UnexpectedEof {
        CalvinError::TruncatedHeader
    } else {
        CalvinError::Io(e)
    }
}

pub(crate) trait ReadExt: Read {
    fn read_u8_be(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf).map_err(map_eof)?;
        Ok(buf[0])
    }

    fn read_u32_be(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf).map_err(map_eof)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).map_err(map_eof)?;
        Ok(buf)
    }

    fn read_str8(&mut self) -> Result<String> {
        let len = self.read_u32_be()? as usize;
        if len > MAX_STRING_UNITS {
            return Err(CalvinError::InvalidString(format!(
                "string of {} bytes exceeds limit",
                len
            )));
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| CalvinError::InvalidString(e.to_string()))
    }

    fn read_str16(&mut self) -> Result<String> {
        let units = self.read_u32_be()? as usize;
        if units > MAX_STRING_UNITS {
            return Err(CalvinError::InvalidString(format!(
                "string of {} code units exceeds limit",
                units
            )));
        }
        let bytes = self.read_bytes(units * 2)?;
        decode_utf16_be(&bytes)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32_be()? as usize;
        if len > MAX_BLOB_BYTES {
            return Err(CalvinError::InvalidString(format!(
                "value of {} bytes exceeds limit",
                len
            )));
        }
        self.read_bytes(len)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

pub(crate) trait WriteExt: Write {
    fn write_u8_be(&mut self, value: u8) -> Result<()> {
        self.write_all(&[value])?;
        Ok(())
    }

    fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| CalvinError::StringTooLong {
            len,
            max: u32::MAX as usize,
        })?;
        self.write_u32_be(len)
    }

    fn write_str8(&mut self, value: &str) -> Result<()> {
        self.write_len(value.len())?;
        self.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_str16(&mut self, value: &str) -> Result<()> {
        let bytes = encode_utf16_be(value);
        self.write_len(bytes.len() / 2)?;
        self.write_all(&bytes)?;
        Ok(())
    }

    fn write_blob(&mut self, value: &[u8]) -> Result<()> {
        self.write_len(value.len())?;
        self.write_all(value)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

pub(crate) fn encode_utf16_be(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

pub(crate) fn decode_utf16_be(bytes: &[u8]) -> Result<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| CalvinError::InvalidString(e.to_string()))
}

/// Encoded size of a `str8`.
pub(crate) fn str8_len(value: &str) -> u64 {
    4 + value.len() as u64
}

/// Encoded size of a `str16`.
pub(crate) fn str16_len(value: &str) -> u64 {
    4 + 2 * value.encode_utf16().count() as u64
}

/// Encoded size of a `blob`.
pub(crate) fn blob_len(len: usize) -> u64 {
    4 + len as u64
}

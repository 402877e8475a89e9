//! File header: magic, version, group tree and root metadata block.

use crate::core::codec::{ReadExt, WriteExt, MAX_PREALLOC};
use crate::core::dataset::DataSetHeader;
use crate::core::error::{CalvinError, Result};
use crate::core::generic::GenericDataHeader;
use crate::core::group::DataGroupHeader;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};

/// First byte of every container.
pub const MAGIC: u8 = 59;

/// Format revision this crate reads and writes.
pub const VERSION: u8 = 1;

/// Fixed prefix: magic, version, group count.
const PREFIX_LEN: u64 = 1 + 1 + 4;

/// The complete header tree of a container.
///
/// # Layout
///
/// ```text
/// u8    magic (59)
/// u8    version (1)
/// u32   group count
///       group blocks, each followed by its dataset blocks
///       metadata block (recursive through parents)
///       data regions, in declaration order
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    groups: Vec<DataGroupHeader>,
    metadata: GenericDataHeader,
}

impl FileHeader {
    pub fn new(metadata: GenericDataHeader) -> Self {
        FileHeader {
            groups: Vec::new(),
            metadata,
        }
    }

    /// Append a group. Names are unique within a file.
    pub fn add_group(&mut self, group: DataGroupHeader) -> Result<()> {
        if self.find_group(group.name()).is_some() {
            return Err(CalvinError::DuplicateName(group.name().to_string()));
        }
        self.groups.push(group);
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn find_group(&self, name: &str) -> Option<&DataGroupHeader> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn find_group_mut(&mut self, name: &str) -> Option<&mut DataGroupHeader> {
        self.groups.iter_mut().find(|g| g.name() == name)
    }

    pub fn find_group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name() == name)
    }

    pub fn group(&self, index: usize) -> Option<&DataGroupHeader> {
        self.groups.get(index)
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut DataGroupHeader> {
        self.groups.get_mut(index)
    }

    pub fn groups(&self) -> &[DataGroupHeader] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name().to_string()).collect()
    }

    pub fn metadata(&self) -> &GenericDataHeader {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut GenericDataHeader {
        &mut self.metadata
    }

    /// Every dataset in declaration order, with its group name.
    pub fn data_sets(&self) -> impl Iterator<Item = (&str, &DataSetHeader)> {
        self.groups
            .iter()
            .flat_map(|g| g.data_sets().iter().map(move |ds| (g.name(), ds)))
    }

    /// Total number of datasets across all groups.
    pub fn data_set_total(&self) -> usize {
        self.groups.iter().map(DataGroupHeader::data_set_count).sum()
    }

    /// Size of the header block in bytes; data starts right after it.
    pub fn encoded_len(&self) -> u64 {
        PREFIX_LEN
            + self
                .groups
                .iter()
                .map(DataGroupHeader::encoded_len)
                .sum::<u64>()
            + self.metadata.encoded_len()
    }

    /// Offset of the root metadata block.
    pub(crate) fn metadata_offset(&self) -> u64 {
        PREFIX_LEN
            + self
                .groups
                .iter()
                .map(DataGroupHeader::encoded_len)
                .sum::<u64>()
    }

    /// Size of the complete file: header plus every data region.
    pub fn file_len(&self) -> u64 {
        self.data_sets()
            .fold(self.encoded_len(), |len, (_, ds)| len.saturating_add(ds.data_len()))
    }

    /// Assign every dataset's data offset by accumulating sizes in
    /// declaration order, then freeze all schemas.
    ///
    /// Returns the total file length.
    pub(crate) fn layout(&mut self) -> Result<u64> {
        // Header size does not depend on offset values, only on their count
        let mut offset = self.encoded_len();
        let mut starts = Vec::with_capacity(self.data_set_total());
        for (_, data_set) in self.data_sets() {
            starts.push(offset);
            offset = offset.saturating_add(data_set.data_len());
        }
        if offset > u64::from(u32::MAX) {
            return Err(CalvinError::OffsetOverflow(offset));
        }

        let data_sets = self.groups.iter_mut().flat_map(|g| g.data_sets_mut());
        for (data_set, start) in data_sets.zip(starts) {
            data_set.set_data_start(start);
            data_set.freeze();
        }
        Ok(offset)
    }

    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_u8_be(MAGIC)?;
        out.write_u8_be(VERSION)?;
        out.write_len(self.groups.len())?;
        for group in &self.groups {
            group.write_to(out)?;
        }
        self.metadata.write_to(out)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse a header block.
    ///
    /// Magic and version are checked before anything else is read. Every
    /// parsed dataset schema is frozen.
    pub fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let magic = input.read_u8_be()?;
        if magic != MAGIC {
            return Err(CalvinError::InvalidMagic(magic));
        }
        let version = input.read_u8_be()?;
        if version != VERSION {
            return Err(CalvinError::UnsupportedVersion(version));
        }

        let group_count = input.read_u32_be()? as usize;
        let mut groups = Vec::with_capacity(group_count.min(MAX_PREALLOC));
        for _ in 0..group_count {
            groups.push(DataGroupHeader::read_from(input)?);
        }
        let metadata = GenericDataHeader::read_from(input)?;

        Ok(FileHeader { groups, metadata })
    }

    /// Parse and validate a complete container image held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Self::read_from(&mut Cursor::new(bytes))?;
        header.validate(bytes.len() as u64)?;
        Ok(header)
    }

    /// Check that every data region lies after the header and inside a file
    /// of `file_len` bytes.
    pub fn validate(&self, file_len: u64) -> Result<()> {
        let header_end = self.encoded_len();
        for (_, data_set) in self.data_sets() {
            let start = data_set.data_start();
            if start < header_end {
                return Err(CalvinError::InvalidOffset {
                    dataset: data_set.name().to_string(),
                    offset: start,
                    header_end,
                });
            }
            let expected_end = start.saturating_add(data_set.data_len());
            if expected_end > file_len {
                return Err(CalvinError::TruncatedData {
                    dataset: data_set.name().to_string(),
                    expected_end,
                    file_len,
                });
            }
        }
        Ok(())
    }

    /// Human-readable dump of the whole tree.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

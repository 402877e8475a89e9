//! Data group headers.

use crate::core::codec::{str16_len, ReadExt, WriteExt, MAX_PREALLOC};
use crate::core::dataset::DataSetHeader;
use crate::core::error::{CalvinError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// A named, ordered collection of datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataGroupHeader {
    name: String,
    data_sets: Vec<DataSetHeader>,
}

impl DataGroupHeader {
    pub fn new(name: impl Into<String>) -> Self {
        DataGroupHeader {
            name: name.into(),
            data_sets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a dataset. Names are unique within a group.
    pub fn add_data_set(&mut self, header: DataSetHeader) -> Result<()> {
        if self.find_data_set(header.name()).is_some() {
            return Err(CalvinError::DuplicateName(format!(
                "{}/{}",
                self.name,
                header.name()
            )));
        }
        self.data_sets.push(header);
        Ok(())
    }

    /// Rename a dataset, keeping names unique within the group.
    ///
    /// Returns `Ok(false)` when no dataset is called `old`.
    pub fn rename_data_set(&mut self, old: &str, new: impl Into<String>) -> Result<bool> {
        let new = new.into();
        let index = match self.find_data_set_index(old) {
            Some(index) => index,
            None => return Ok(false),
        };
        if new != old && self.find_data_set(&new).is_some() {
            return Err(CalvinError::DuplicateName(format!("{}/{}", self.name, new)));
        }
        self.data_sets[index].set_name(new)?;
        Ok(true)
    }

    /// Exact, case-sensitive lookup.
    pub fn find_data_set(&self, name: &str) -> Option<&DataSetHeader> {
        self.data_sets.iter().find(|ds| ds.name() == name)
    }

    pub fn find_data_set_mut(&mut self, name: &str) -> Option<&mut DataSetHeader> {
        self.data_sets.iter_mut().find(|ds| ds.name() == name)
    }

    pub fn find_data_set_index(&self, name: &str) -> Option<usize> {
        self.data_sets.iter().position(|ds| ds.name() == name)
    }

    pub fn data_set(&self, index: usize) -> Option<&DataSetHeader> {
        self.data_sets.get(index)
    }

    pub fn data_set_mut(&mut self, index: usize) -> Option<&mut DataSetHeader> {
        self.data_sets.get_mut(index)
    }

    pub fn data_sets(&self) -> &[DataSetHeader] {
        &self.data_sets
    }

    pub(crate) fn data_sets_mut(&mut self) -> std::slice::IterMut<'_, DataSetHeader> {
        self.data_sets.iter_mut()
    }

    pub fn data_set_count(&self) -> usize {
        self.data_sets.len()
    }

    pub fn data_set_names(&self) -> Vec<String> {
        self.data_sets.iter().map(|ds| ds.name().to_string()).collect()
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        str16_len(&self.name)
            + 4
            + self
                .data_sets
                .iter()
                .map(DataSetHeader::encoded_len)
                .sum::<u64>()
    }

    pub(crate) fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_str16(&self.name)?;
        out.write_len(self.data_sets.len())?;
        for data_set in &self.data_sets {
            data_set.write_to(out)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let name = input.read_str16()?;
        let count = input.read_u32_be()? as usize;
        let mut data_sets = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            data_sets.push(DataSetHeader::read_from(input)?);
        }
        Ok(DataGroupHeader { name, data_sets })
    }
}

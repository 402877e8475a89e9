//! Generic metadata header: file identity, free-form parameters and the
//! provenance chain of ancestor headers.

use crate::core::codec::{str16_len, str8_len, ReadExt, WriteExt, MAX_PREALLOC};
use crate::core::config::{ContainerConfig, DEFAULT_LOCALE};
use crate::core::error::{CalvinError, Result};
use crate::core::param::{Parameter, ParameterList};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Deepest provenance chain the reader will follow.
const MAX_PARENT_DEPTH: usize = 256;

/// Per-file metadata block.
///
/// Parents are shared, immutable snapshots. A header can only be linked as a
/// parent after it has been wrapped in an [`Arc`], so it can never become its
/// own ancestor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericDataHeader {
    file_type: String,
    file_id: String,
    creation_time: String,
    locale: String,
    params: ParameterList,
    parents: Vec<Arc<GenericDataHeader>>,
}

impl GenericDataHeader {
    pub fn new(file_type: impl Into<String>) -> Self {
        GenericDataHeader {
            file_type: file_type.into(),
            locale: DEFAULT_LOCALE.to_string(),
            ..Default::default()
        }
    }

    /// New header stamped with the configured locale.
    pub fn from_config(file_type: impl Into<String>, config: &ContainerConfig) -> Self {
        let mut header = Self::new(file_type);
        header.locale = config.default_locale.clone();
        header
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn set_file_type(&mut self, file_type: impl Into<String>) {
        self.file_type = file_type.into();
    }

    /// File identifier; empty until assigned or written.
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn set_file_id(&mut self, file_id: impl Into<String>) {
        self.file_id = file_id.into();
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    /// ISO-8601 creation time, or empty when never stamped.
    pub fn creation_time(&self) -> &str {
        &self.creation_time
    }

    pub fn set_creation_time(&mut self, time: DateTime<Utc>) {
        self.creation_time = time.to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    pub fn stamp_creation_time(&mut self) {
        self.set_creation_time(Utc::now());
    }

    /// Parsed creation time, if one is set and well formed.
    pub fn creation_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.creation_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub(crate) fn params_mut(&mut self) -> &mut ParameterList {
        &mut self.params
    }

    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.params.push(parameter);
    }

    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.find(name)
    }

    /// Append an ancestor to the provenance chain.
    pub fn add_parent(&mut self, parent: impl Into<Arc<GenericDataHeader>>) {
        self.parents.push(parent.into());
    }

    pub fn parents(&self) -> &[Arc<GenericDataHeader>] {
        &self.parents
    }

    /// First ancestor of `file_type`, searched depth-first.
    pub fn find_parent(&self, file_type: &str) -> Option<&GenericDataHeader> {
        for parent in &self.parents {
            if parent.file_type == file_type {
                return Some(parent);
            }
            if let Some(found) = parent.find_parent(file_type) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn encoded_len(&self) -> u64 {
        str8_len(&self.file_type)
            + str8_len(&self.file_id)
            + str16_len(&self.creation_time)
            + str16_len(&self.locale)
            + self.params.encoded_len()
            + 4
            + self
                .parents
                .iter()
                .map(|p| p.encoded_len())
                .sum::<u64>()
    }

    /// Offset of the file identifier's bytes relative to the block start.
    pub(crate) fn file_id_offset(&self) -> u64 {
        str8_len(&self.file_type) + 4
    }

    /// Offset of the parameter list relative to the block start.
    pub(crate) fn params_offset(&self) -> u64 {
        str8_len(&self.file_type)
            + str8_len(&self.file_id)
            + str16_len(&self.creation_time)
            + str16_len(&self.locale)
    }

    pub(crate) fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_str8(&self.file_type)?;
        out.write_str8(&self.file_id)?;
        out.write_str16(&self.creation_time)?;
        out.write_str16(&self.locale)?;
        self.params.write_to(out)?;
        out.write_len(self.parents.len())?;
        for parent in &self.parents {
            parent.write_to(out)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        Self::read_nested(input, 0)
    }

    fn read_nested<R: Read + ?Sized>(input: &mut R, depth: usize) -> Result<Self> {
        if depth > MAX_PARENT_DEPTH {
            return Err(CalvinError::InvalidString(format!(
                "provenance chain deeper than {}",
                MAX_PARENT_DEPTH
            )));
        }

        let file_type = input.read_str8()?;
        let file_id = input.read_str8()?;
        let creation_time = input.read_str16()?;
        let locale = input.read_str16()?;
        let params = ParameterList::read_from(input)?;

        let parent_count = input.read_u32_be()? as usize;
        let mut parents = Vec::with_capacity(parent_count.min(MAX_PREALLOC));
        for _ in 0..parent_count {
            parents.push(Arc::new(Self::read_nested(input, depth + 1)?));
        }

        Ok(GenericDataHeader {
            file_type,
            file_id,
            creation_time,
            locale,
            params,
            parents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::param::ParameterValue;
    use std::io::Cursor;

    fn chain() -> GenericDataHeader {
        let mut scan = GenericDataHeader::new("affymetrix-calvin-scan-acquisition");
        scan.set_file_id("scan-0001");

        let mut intensity = GenericDataHeader::new("affymetrix-calvin-intensity");
        intensity.set_file_id("cel-0001");
        intensity.add_parent(scan);

        let mut result = GenericDataHeader::new("affymetrix-calvin-multi-data");
        result.add_parameter(Parameter::new("program", ParameterValue::Text("quant".into())));
        result.add_parent(intensity);
        result
    }

    #[test]
    fn test_defaults() {
        let header = GenericDataHeader::new("t");
        assert_eq!(header.locale(), "en-US");
        assert!(header.file_id().is_empty());
        assert!(header.creation_datetime().is_none());
    }

    #[test]
    fn test_config_locale() {
        let config = ContainerConfig {
            default_locale: "de-DE".to_string(),
            ..Default::default()
        };
        assert_eq!(GenericDataHeader::from_config("t", &config).locale(), "de-DE");
    }

    #[test]
    fn test_creation_time_stamp() {
        let mut header = GenericDataHeader::new("t");
        header.stamp_creation_time();
        assert!(header.creation_time().ends_with('Z'));
        assert!(header.creation_datetime().is_some());
    }

    #[test]
    fn test_find_parent_depth_first() {
        let header = chain();
        let scan = header
            .find_parent("affymetrix-calvin-scan-acquisition")
            .unwrap();
        assert_eq!(scan.file_id(), "scan-0001");
        assert!(header.find_parent("affymetrix-calvin-multi-data").is_none());
    }

    #[test]
    fn test_shared_parent_snapshot() {
        let parent = Arc::new(GenericDataHeader::new("shared"));
        let mut a = GenericDataHeader::new("a");
        let mut b = GenericDataHeader::new("b");
        a.add_parent(Arc::clone(&parent));
        b.add_parent(Arc::clone(&parent));
        assert_eq!(Arc::strong_count(&parent), 3);
    }

    #[test]
    fn test_block_round_trip() {
        let header = chain();
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        assert_eq!(out.len() as u64, header.encoded_len());

        let parsed = GenericDataHeader::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(parsed, header);
    }
}

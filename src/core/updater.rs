//! In-place rewriting of existing containers.
//!
//! [`RecordUpdater`] rewrites whole rows or single cells of a dataset.
//! [`MetadataUpdater`] rewrites the file identifier and parameter values of
//! the root metadata block when the new value fits the stored bytes. Neither
//! ever changes the size of the file or any header length field.
//!
//! Both record the file length when the header is parsed and refuse to write
//! once it has changed, since the parsed offsets may no longer be valid.

use crate::core::codec::str16_len;
use crate::core::column::ColumnValue;
use crate::core::dataset::DataSetHeader;
use crate::core::error::{CalvinError, Result};
use crate::core::header::FileHeader;
use crate::core::param::{Parameter, ParameterValue};
use crate::core::reader::read_header;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn open_rw(path: &Path) -> Result<(File, FileHeader, u64)> {
    if !path.exists() {
        return Err(CalvinError::FileNotFound(path.to_path_buf()));
    }
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let (header, file_len) = read_header(&file)?;
    Ok((file, header, file_len))
}

fn check_stale(file: &File, expected: u64) -> Result<()> {
    let actual = file.metadata()?.len();
    if actual != expected {
        warn!(
            "Refusing to rewrite: file length changed from {} to {}",
            expected, actual
        );
        return Err(CalvinError::StaleHeader { expected, actual });
    }
    Ok(())
}

fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    Ok(())
}

/// Rewrites rows of an existing container.
///
/// The caller must make sure no other writer touches the file meanwhile.
#[derive(Debug)]
pub struct RecordUpdater {
    file: File,
    path: PathBuf,
    header: FileHeader,
    file_len: u64,
}

impl RecordUpdater {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (file, header, file_len) = open_rw(path)?;
        debug!("Opened {} for record updates", path.display());
        Ok(RecordUpdater {
            file,
            path: path.to_path_buf(),
            header,
            file_len,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Updater for one dataset, or `None` if the group or dataset is absent.
    pub fn data_set(&mut self, group: &str, name: &str) -> Option<DataSetUpdater<'_>> {
        let header = self.header.find_group(group)?.find_data_set(name)?;
        Some(DataSetUpdater {
            file: &mut self.file,
            header,
            file_len: self.file_len,
        })
    }

    /// Flush rewritten rows to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Row writer bound to one dataset of a [`RecordUpdater`].
pub struct DataSetUpdater<'a> {
    file: &'a mut File,
    header: &'a DataSetHeader,
    file_len: u64,
}

impl<'a> DataSetUpdater<'a> {
    pub fn header(&self) -> &DataSetHeader {
        self.header
    }

    /// Replace one row with encoded bytes of exactly the row width.
    pub fn update_raw_row(&mut self, row: u64, bytes: &[u8]) -> Result<()> {
        self.header.check_row_width(bytes)?;
        let offset = self.header.row_offset(row)?;
        check_stale(&*self.file, self.file_len)?;

        write_at(self.file, offset, bytes)?;
        debug!(
            "Rewrote row {} of {} at offset {}",
            row,
            self.header.name(),
            offset
        );
        Ok(())
    }

    /// Replace one row.
    pub fn update_row(&mut self, row: u64, values: &[ColumnValue]) -> Result<()> {
        let bytes = self.header.encode_row(values)?;
        self.update_raw_row(row, &bytes)
    }

    /// Replace one cell, leaving the rest of the row untouched.
    pub fn update_value(&mut self, row: u64, column: usize, value: &ColumnValue) -> Result<()> {
        let info = self.header.column(column)?;
        let offset = self.header.row_offset(row)? + self.header.column_offset(column)? as u64;

        let mut cell = vec![0u8; info.byte_width()];
        info.column_type.encode(value, column, &mut cell)?;
        check_stale(&*self.file, self.file_len)?;

        write_at(self.file, offset, &cell)?;
        debug!(
            "Rewrote row {} column {} of {} at offset {}",
            row,
            column,
            self.header.name(),
            offset
        );
        Ok(())
    }
}

/// Outcome of a [`MetadataUpdater::update`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdateReport {
    pub file_id_updated: bool,
    /// Parameters rewritten in place
    pub updated: Vec<String>,
    /// Requested changes that did not fit; `file_id` names the identifier
    pub skipped: Vec<String>,
}

/// Rewrites values in the root metadata block without moving any byte.
#[derive(Debug)]
pub struct MetadataUpdater {
    file: File,
    header: FileHeader,
    file_len: u64,
}

impl MetadataUpdater {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (file, header, file_len) = open_rw(path.as_ref())?;
        Ok(MetadataUpdater {
            file,
            header,
            file_len,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Rewrite the file identifier and the named parameters.
    ///
    /// The identifier is replaced only when the new one has the same byte
    /// length. A parameter is replaced only when a stored parameter of that
    /// name has the same type and its stored value bytes can hold the new
    /// value. Everything else is reported as skipped and left untouched.
    pub fn update(
        &mut self,
        file_id: Option<&str>,
        params: &[Parameter],
    ) -> Result<MetadataUpdateReport> {
        check_stale(&self.file, self.file_len)?;

        let base = self.header.metadata_offset();
        let metadata = self.header.metadata();
        let mut report = MetadataUpdateReport::default();
        let mut writes: Vec<(u64, Vec<u8>)> = Vec::new();

        if let Some(id) = file_id {
            if id.len() == metadata.file_id().len() {
                writes.push((base + metadata.file_id_offset(), id.as_bytes().to_vec()));
                report.file_id_updated = true;
            } else {
                warn!(
                    "File identifier of {} bytes does not fit {} stored bytes",
                    id.len(),
                    metadata.file_id().len()
                );
                report.skipped.push("file_id".to_string());
            }
        }

        // Offset of each stored parameter's value bytes
        let mut locations = Vec::with_capacity(metadata.params().len());
        let mut pos = base + metadata.params_offset() + 4;
        for stored in metadata.params() {
            let blob_len = stored.encode_value().len();
            locations.push((pos + str16_len(&stored.name) + 4, blob_len));
            pos += stored.encoded_len();
        }

        let mut replaced: Vec<(usize, ParameterValue)> = Vec::new();
        for param in params {
            let found = metadata
                .params()
                .iter()
                .position(|stored| stored.name == param.name);
            let Some(index) = found else {
                warn!("No stored parameter named {}", param.name);
                report.skipped.push(param.name.clone());
                continue;
            };

            let (offset, stored_len) = locations[index];
            let Some(stored) = metadata.params().get(index) else {
                continue;
            };
            let replacement = Parameter::new(param.name.clone(), param.value.clone());
            let mut blob = replacement.encode_value();
            if !stored.value.same_kind(&param.value)
                || blob.len() > stored_len
                || replacement.check().is_err()
            {
                warn!(
                    "Parameter {} ({}, {} bytes) does not fit stored {} ({} bytes)",
                    param.name,
                    param.mime_type(),
                    blob.len(),
                    stored.mime_type(),
                    stored_len
                );
                report.skipped.push(param.name.clone());
                continue;
            }

            blob.resize(stored_len, 0);
            writes.push((offset, blob));
            replaced.push((index, param.value.clone()));
            report.updated.push(param.name.clone());
        }

        for (offset, bytes) in &writes {
            write_at(&mut self.file, *offset, bytes)?;
            debug!("Rewrote {} metadata bytes at offset {}", bytes.len(), offset);
        }

        // Keep the in-memory header in step with the file
        let metadata = self.header.metadata_mut();
        if report.file_id_updated {
            if let Some(id) = file_id {
                metadata.set_file_id(id);
            }
        }
        for (index, value) in replaced {
            let (_, stored_len) = locations[index];
            if let Some(stored) = metadata.params_mut().get_mut(index) {
                stored.capacity = if value.is_text() { stored_len } else { 0 };
                stored.value = value;
            }
        }

        Ok(report)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

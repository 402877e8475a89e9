//! Dataset planes: independent read views onto one dataset.
//!
//! Each plane owns its read position. Planes over a shared memory map only
//! copy out of the map; planes without one hold a private file handle, so
//! interleaving reads across planes never disturbs another plane's cursor.

use crate::core::checksum::{ones_complement, verify_expected};
use crate::core::column::{ColumnValue, FromColumn};
use crate::core::config::ContainerConfig;
use crate::core::dataset::DataSetHeader;
use crate::core::error::{CalvinError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
enum Backing {
    /// Whole-file read-only map, possibly shared with other planes
    Mapped(Arc<Mmap>),
    /// Private cursor
    Stream(File),
    /// The dataset's data region, read up front
    Loaded(Vec<u8>),
}

/// A read view onto one dataset.
///
/// Planes start closed; every data access on a closed plane fails with
/// [`CalvinError::DataSetNotOpen`].
#[derive(Debug)]
pub struct DataSet {
    path: PathBuf,
    group: String,
    header: DataSetHeader,
    use_memory_mapping: bool,
    load_entire_data_set: bool,
    shared_map: Option<Arc<Mmap>>,
    backing: Option<Backing>,
}

impl DataSet {
    /// A closed plane over `header`'s data in the container at `path`.
    pub fn new<P: AsRef<Path>>(
        path: P,
        group: impl Into<String>,
        header: DataSetHeader,
        config: &ContainerConfig,
    ) -> Self {
        DataSet {
            path: path.as_ref().to_path_buf(),
            group: group.into(),
            header,
            use_memory_mapping: config.use_memory_mapping,
            load_entire_data_set: config.load_entire_data_set,
            shared_map: None,
            backing: None,
        }
    }

    /// Reuse an existing map of the container instead of mapping it again.
    pub(crate) fn with_shared_map(mut self, map: Arc<Mmap>) -> Self {
        self.shared_map = Some(map);
        self
    }

    pub fn open(&mut self) -> Result<()> {
        if self.backing.is_some() {
            return Ok(());
        }

        let backing = if self.use_memory_mapping {
            let map = match &self.shared_map {
                Some(map) => Arc::clone(map),
                None => {
                    let file = File::open(&self.path)?;
                    // SAFETY: the map is read-only and callers keep writers
                    // away from a file while it is being read
                    Arc::new(unsafe { Mmap::map(&file)? })
                }
            };
            Backing::Mapped(map)
        } else if self.load_entire_data_set {
            let mut file = File::open(&self.path)?;
            file.seek(SeekFrom::Start(self.header.data_start()))?;
            let mut data = vec![0u8; self.header.data_len() as usize];
            if let Err(e) = file.read_exact(&mut data) {
                return Err(truncated(&self.header, &file, e));
            }
            Backing::Loaded(data)
        } else {
            Backing::Stream(File::open(&self.path)?)
        };

        debug!(
            "Opened plane {}/{} ({})",
            self.group,
            self.header.name(),
            match backing {
                Backing::Mapped(_) => "mapped",
                Backing::Stream(_) => "stream",
                Backing::Loaded(_) => "loaded",
            }
        );
        self.backing = Some(backing);
        Ok(())
    }

    /// Release the plane's file handle or map reference.
    pub fn close(&mut self) {
        self.backing = None;
    }

    pub fn is_open(&self) -> bool {
        self.backing.is_some()
    }

    pub fn header(&self) -> &DataSetHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn group_name(&self) -> &str {
        &self.group
    }

    pub fn rows(&self) -> u64 {
        u64::from(self.header.row_count())
    }

    pub fn cols(&self) -> usize {
        self.header.column_count()
    }

    pub fn bytes_per_row(&self) -> usize {
        self.header.row_width()
    }

    /// Encoded bytes of one row.
    pub fn raw_row(&mut self, row: u64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let offset = self.header.row_offset(row)?;
        self.read_at(offset, self.header.row_width())
    }

    /// Decoded values of one row.
    pub fn row(&mut self, row: u64) -> Result<Vec<ColumnValue>> {
        let bytes = self.raw_row(row)?;
        self.header.decode_row(&bytes)
    }

    /// One decoded cell.
    pub fn value(&mut self, row: u64, column: usize) -> Result<ColumnValue> {
        self.ensure_open()?;
        let info = self.header.column(column)?.clone();
        let offset = self.header.row_offset(row)? + self.header.column_offset(column)? as u64;
        let cell = self.read_at(offset, info.byte_width())?;
        info.column_type.decode(&cell)
    }

    /// One cell as a Rust value; the column kind must match `T`.
    pub fn get<T: FromColumn>(&mut self, row: u64, column: usize) -> Result<T> {
        let value = self.value(row, column)?;
        self.typed(value, column)
    }

    /// Up to `count` consecutive cells of `column` starting at `start`.
    ///
    /// Asking for more rows than remain returns the rows that remain.
    pub fn column<T: FromColumn>(&mut self, column: usize, start: u64, count: u64) -> Result<Vec<T>> {
        self.ensure_open()?;
        let info = self.header.column(column)?.clone();
        let first = self.header.row_offset(start)?;
        let count = count.min(self.rows() - start);

        let width = self.header.row_width();
        let cell_start = self.header.column_offset(column)?;
        let block = self.read_at(first, count as usize * width)?;

        let mut values = Vec::with_capacity(count as usize);
        for row in block.chunks_exact(width) {
            let value = info
                .column_type
                .decode(&row[cell_start..cell_start + info.byte_width()])?;
            values.push(self.typed(value, column)?);
        }
        Ok(values)
    }

    /// The whole data region.
    pub fn data(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.read_at(self.header.data_start(), self.header.data_len() as usize)
    }

    /// One's-complement checksum of the data region.
    pub fn checksum(&mut self) -> Result<u16> {
        Ok(ones_complement(&self.data()?))
    }

    pub fn verify_checksum(&mut self, expected: u16) -> Result<()> {
        let data = self.data()?;
        verify_expected(&data, expected)
    }

    fn typed<T: FromColumn>(&self, value: ColumnValue, column: usize) -> Result<T> {
        T::from_column(value).ok_or_else(|| CalvinError::UnexpectedColumnType {
            column,
            actual: self.header.columns()[column].column_type.to_string(),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.backing.is_none() {
            return Err(CalvinError::DataSetNotOpen(self.header.name().to_string()));
        }
        Ok(())
    }

    /// Read `len` bytes at absolute file offset `offset`.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data_start = self.header.data_start();
        match self.backing.as_mut() {
            Some(Backing::Mapped(map)) => {
                let start = offset as usize;
                let end = start + len;
                if end > map.len() {
                    return Err(CalvinError::TruncatedData {
                        dataset: self.header.name().to_string(),
                        expected_end: end as u64,
                        file_len: map.len() as u64,
                    });
                }
                Ok(map[start..end].to_vec())
            }
            Some(Backing::Stream(file)) => {
                let mut buf = vec![0u8; len];
                file.seek(SeekFrom::Start(offset))?;
                if let Err(e) = file.read_exact(&mut buf) {
                    return Err(truncated(&self.header, file, e));
                }
                Ok(buf)
            }
            Some(Backing::Loaded(data)) => {
                let start = (offset - data_start) as usize;
                Ok(data[start..start + len].to_vec())
            }
            None => Err(CalvinError::DataSetNotOpen(self.header.name().to_string())),
        }
    }
}

/// Map a short read on a plane's file to a format error.
fn truncated(header: &DataSetHeader, file: &File, e: std::io::Error) -> CalvinError {
    if e.kind() != std::io::ErrorKind::UnexpectedEof {
        return CalvinError::Io(e);
    }
    CalvinError::TruncatedData {
        dataset: header.name().to_string(),
        expected_end: header.data_start() + header.data_len(),
        file_len: file.metadata().map(|m| m.len()).unwrap_or(0),
    }
}

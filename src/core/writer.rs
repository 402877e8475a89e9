//! Container writer.
//!
//! Offsets are computed before any byte is emitted: the header's encoded size
//! depends only on names, schemas and parameters, never on offset values, so
//! every dataset's data offset is known up front and the output only needs
//! to be `Write`.

use crate::core::column::ColumnValue;
use crate::core::config::ContainerConfig;
use crate::core::dataset::DataSetHeader;
use crate::core::error::{CalvinError, Result};
use crate::core::guid::{Identifier, IdentifierKind};
use crate::core::header::FileHeader;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

type Finalizer<W> = Box<dyn FnOnce(&mut W, u64) -> Result<()> + Send>;

/// Rows written so far for the dataset currently being streamed.
#[derive(Debug, Clone, Copy)]
struct Progress {
    index: usize,
    rows: u64,
}

/// Streams a header tree and then every dataset's rows in declaration order.
pub struct FileWriter<W: Write> {
    out: W,
    header: FileHeader,
    /// (group, dataset) indices in declaration order
    order: Vec<(usize, usize)>,
    next: usize,
    current: Option<Progress>,
    bytes_written: u64,
    file_len: u64,
    finalize: Option<Finalizer<W>>,
}

impl FileWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header block.
    pub fn create<P: AsRef<Path>>(
        path: P,
        header: FileHeader,
        config: &ContainerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let sync = config.sync_on_finish;
        let verify = config.verify_file_size;
        let mut writer = Self::new(BufWriter::new(file), header)?;
        writer.finalize = Some(Box::new(move |out: &mut BufWriter<File>, expected: u64| -> Result<()> {
            let file = out.get_ref();
            if sync {
                file.sync_all()?;
            }
            if verify {
                let actual = file.metadata()?.len();
                if actual != expected {
                    return Err(CalvinError::SizeMismatch { expected, actual });
                }
            }
            info!("Wrote {} ({} bytes)", path.display(), expected);
            Ok(())
        }));
        Ok(writer)
    }
}

impl<W: Write> FileWriter<W> {
    /// Lay out `header` and write it to `out`.
    ///
    /// An empty file identifier is replaced by a fresh one. Every dataset
    /// schema is frozen from here on.
    pub fn new(mut out: W, mut header: FileHeader) -> Result<Self> {
        if header.metadata().file_id().is_empty() {
            let id = Identifier::generate(IdentifierKind::General);
            header.metadata_mut().set_file_id(id.into_string());
        }

        let file_len = header.layout()?;
        let order: Vec<(usize, usize)> = header
            .groups()
            .iter()
            .enumerate()
            .flat_map(|(g, group)| (0..group.data_set_count()).map(move |d| (g, d)))
            .collect();

        for (group, data_set) in header.data_sets() {
            debug!(
                "Data set {}/{}: offset {}, {} rows x {} bytes",
                group,
                data_set.name(),
                data_set.data_start(),
                data_set.row_count(),
                data_set.row_width()
            );
        }

        header.write_to(&mut out)?;
        let bytes_written = header.encoded_len();

        Ok(FileWriter {
            out,
            header,
            order,
            next: 0,
            current: None,
            bytes_written,
            file_len,
            finalize: None,
        })
    }

    /// The laid-out header: file identifier assigned, offsets filled in.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Expected size of the finished file.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Start streaming the next declared dataset.
    ///
    /// Fails if the previous dataset did not receive all of its rows.
    pub fn next_data_set(&mut self) -> Result<DataSetWriter<'_, W>> {
        self.check_current_complete()?;
        if self.next >= self.order.len() {
            return Err(CalvinError::NoMoreDataSets);
        }
        self.current = Some(Progress {
            index: self.next,
            rows: 0,
        });
        self.next += 1;
        Ok(DataSetWriter { file: self })
    }

    /// Flush the output after checking that every dataset is complete.
    ///
    /// Files opened with [`FileWriter::create`] are also synced and their
    /// physical size verified, per the configuration they were created with.
    pub fn finish(mut self) -> Result<W> {
        self.check_current_complete()?;
        if let Some(&(g, d)) = self.order.get(self.next) {
            let data_set = self.data_set_at(g, d)?;
            return Err(CalvinError::IncompleteDataSet {
                dataset: data_set.name().to_string(),
                written: 0,
                declared: u64::from(data_set.row_count()),
            });
        }
        if self.bytes_written != self.file_len {
            return Err(CalvinError::SizeMismatch {
                expected: self.file_len,
                actual: self.bytes_written,
            });
        }

        self.out.flush()?;
        if let Some(finalize) = self.finalize.take() {
            finalize(&mut self.out, self.file_len)?;
        }
        Ok(self.out)
    }

    fn data_set_at(&self, group: usize, data_set: usize) -> Result<&DataSetHeader> {
        self.header
            .group(group)
            .and_then(|g| g.data_set(data_set))
            .ok_or(CalvinError::NoMoreDataSets)
    }

    fn current_header(&self) -> Result<(&DataSetHeader, Progress)> {
        let progress = self.current.ok_or(CalvinError::NoMoreDataSets)?;
        let (g, d) = self.order[progress.index];
        Ok((self.data_set_at(g, d)?, progress))
    }

    fn check_current_complete(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Ok(());
        }
        let (data_set, progress) = self.current_header()?;
        let declared = u64::from(data_set.row_count());
        if progress.rows != declared {
            return Err(CalvinError::IncompleteDataSet {
                dataset: data_set.name().to_string(),
                written: progress.rows,
                declared,
            });
        }
        self.current = None;
        Ok(())
    }
}

/// Row sink for one dataset. Obtained from [`FileWriter::next_data_set`].
pub struct DataSetWriter<'a, W: Write> {
    file: &'a mut FileWriter<W>,
}

impl<'a, W: Write> DataSetWriter<'a, W> {
    pub fn header(&self) -> Result<&DataSetHeader> {
        Ok(self.file.current_header()?.0)
    }

    pub fn rows_written(&self) -> u64 {
        self.file.current.map_or(0, |p| p.rows)
    }

    /// Encode and append one row.
    pub fn write_row(&mut self, values: &[ColumnValue]) -> Result<()> {
        let row = self.file.current_header()?.0.encode_row(values)?;
        self.write_raw_row(&row)
    }

    /// Append one pre-encoded row.
    pub fn write_raw_row(&mut self, row: &[u8]) -> Result<()> {
        let (data_set, progress) = self.file.current_header()?;
        data_set.check_row_width(row)?;
        if progress.rows >= u64::from(data_set.row_count()) {
            return Err(CalvinError::RowCountExceeded {
                dataset: data_set.name().to_string(),
                declared: u64::from(data_set.row_count()),
            });
        }

        self.file.out.write_all(row)?;
        self.file.bytes_written += row.len() as u64;
        if let Some(current) = self.file.current.as_mut() {
            current.rows += 1;
        }
        Ok(())
    }

    /// Close this dataset; fails if fewer rows than declared were written.
    pub fn finish(self) -> Result<()> {
        self.file.check_current_complete()
    }
}

/// Write a whole container to `path`, calling `fill` once per dataset in
/// declaration order. Returns the laid-out header.
pub fn write_file<P, F>(path: P, header: FileHeader, mut fill: F) -> Result<FileHeader>
where
    P: AsRef<Path>,
    F: FnMut(&DataSetHeader, &mut DataSetWriter<'_, BufWriter<File>>) -> Result<()>,
{
    let mut writer = FileWriter::create(path, header, &ContainerConfig::default())?;
    for _ in 0..writer.header().data_set_total() {
        let mut sink = writer.next_data_set()?;
        let data_set = sink.header()?.clone();
        fill(&data_set, &mut sink)?;
        sink.finish()?;
    }
    let header = writer.header().clone();
    writer.finish()?;
    Ok(header)
}

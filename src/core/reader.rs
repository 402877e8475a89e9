//! Header parsing for containers on disk.

use crate::core::error::{CalvinError, Result};
use crate::core::header::FileHeader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parsed container header, together with the file it came from.
///
/// Parsing reads only the header block. Data regions are checked against
/// the file length but not read; planes and updaters seek into them.
#[derive(Debug, Clone)]
pub struct FileReader {
    path: PathBuf,
    header: FileHeader,
    file_len: u64,
}

impl FileReader {
    /// Open `path` and parse its header tree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CalvinError::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let (header, file_len) = read_header(&file)?;

        debug!(
            "Parsed {}: {} groups, {} data sets, header {} bytes, file {} bytes",
            path.display(),
            header.group_count(),
            header.data_set_total(),
            header.encoded_len(),
            file_len
        );

        Ok(FileReader {
            path: path.to_path_buf(),
            header,
            file_len,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn into_header(self) -> FileHeader {
        self.header
    }

    /// File length observed while parsing.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse and validate the header of an open container file.
///
/// Returns the header and the file length it was validated against.
pub(crate) fn read_header(file: &File) -> Result<(FileHeader, u64)> {
    let file_len = file.metadata()?.len();
    let mut input = BufReader::new(file);
    let header = FileHeader::read_from(&mut input)?;
    header.validate(file_len)?;
    Ok((header, file_len))
}

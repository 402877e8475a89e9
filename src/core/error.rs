use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalvinError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid magic number in header: {0:#04x}")]
    InvalidMagic(u8),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("Header is truncated")]
    TruncatedHeader,

    #[error("Data region of '{dataset}' is truncated: needs {expected_end} bytes, file has {file_len}")]
    TruncatedData {
        dataset: String,
        expected_end: u64,
        file_len: u64,
    },

    #[error("Data offset {offset} of '{dataset}' points inside the header (header ends at {header_end})")]
    InvalidOffset {
        dataset: String,
        offset: u64,
        header_end: u64,
    },

    #[error("Invalid string encoding: {0}")]
    InvalidString(String),

    #[error("Invalid column type tag: {0}")]
    InvalidColumnType(u8),

    #[error("Invalid parameter type: {0}")]
    InvalidMimeType(String),

    #[error("Row index {row} out of range (rows: {rows})")]
    RowOutOfRange { row: u64, rows: u64 },

    #[error("Column index {column} out of range (columns: {columns})")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("String of {len} units exceeds column maximum of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("Row is {actual} bytes, schema requires {expected}")]
    RowWidthMismatch { expected: usize, actual: usize },

    #[error("Row has {actual} values, schema has {expected} columns")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Column {column} holds {expected} values, got {actual}")]
    TypeMismatch {
        column: usize,
        expected: String,
        actual: String,
    },

    #[error("Column {column} is of type {actual}")]
    UnexpectedColumnType { column: usize, actual: String },

    #[error("Schema of '{0}' is frozen")]
    SchemaFrozen(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Data set '{0}' is not open")]
    DataSetNotOpen(String),

    #[error("Data set '{dataset}' got {written} of {declared} rows")]
    IncompleteDataSet {
        dataset: String,
        written: u64,
        declared: u64,
    },

    #[error("Data set '{dataset}' declares only {declared} rows")]
    RowCountExceeded { dataset: String, declared: u64 },

    #[error("No more data sets to write")]
    NoMoreDataSets,

    #[error("Layout needs offset {0}, beyond the 32-bit offset range")]
    OffsetOverflow(u64),

    #[error("File changed since its header was read: length {expected} is now {actual}")]
    StaleHeader { expected: u64, actual: u64 },

    #[error("Written file is {actual} bytes, layout requires {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Checksum verification failed: expected {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CalvinError {
    /// Format errors mean the bytes are not a conforming container.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CalvinError::InvalidMagic(_)
                | CalvinError::UnsupportedVersion(_)
                | CalvinError::TruncatedHeader
                | CalvinError::TruncatedData { .. }
                | CalvinError::InvalidOffset { .. }
                | CalvinError::InvalidString(_)
                | CalvinError::InvalidColumnType(_)
                | CalvinError::InvalidMimeType(_)
        )
    }

    /// Range errors signal caller misuse of row/column bounds.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            CalvinError::RowOutOfRange { .. }
                | CalvinError::ColumnOutOfRange { .. }
                | CalvinError::StringTooLong { .. }
                | CalvinError::RowWidthMismatch { .. }
                | CalvinError::ColumnCountMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CalvinError>;

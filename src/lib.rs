//! # Calvin - Hierarchical Binary Data Container
//!
//! `calvin-rs` reads, writes and updates Calvin containers: self-describing
//! binary files that hold groups of fixed-width tables alongside a metadata
//! header with typed parameters and a provenance chain of parent headers.
//!
//! - **Header tree**: file header, data groups, data sets, generic metadata
//! - **Writer** that lays out every offset before the first byte is written
//! - **Planes**: independent read views onto a data set (memory mapped or streamed)
//! - **Updaters** that rewrite rows and metadata values in place
//! - **Equivalence** checking between two containers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calvin_rs::{
//!     write_file, ColumnInfo, ColumnValue, DataGroupHeader, DataSetHeader, FileHeader,
//!     GenericData, GenericDataHeader, Result,
//! };
//!
//! # fn main() -> Result<()> {
//! let mut intensities = DataSetHeader::new("Intensities");
//! intensities.add_column(ColumnInfo::float("Intensity"))?;
//! intensities.set_row_count(2)?;
//!
//! let mut group = DataGroupHeader::new("Default");
//! group.add_data_set(intensities)?;
//!
//! let mut header = FileHeader::new(GenericDataHeader::new("scan"));
//! header.add_group(group)?;
//!
//! write_file("scan.calvin", header, |_, sink| {
//!     sink.write_row(&[ColumnValue::Float(1.5)])?;
//!     sink.write_row(&[ColumnValue::Float(2.5)])
//! })?;
//!
//! let data = GenericData::open("scan.calvin")?;
//! if let Some(mut plane) = data.data_set("Default", "Intensities")? {
//!     let value: f32 = plane.get(1, 0)?;
//!     assert_eq!(value, 2.5);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Updating in place
//!
//! ```rust,no_run
//! use calvin_rs::{ColumnValue, RecordUpdater, Result};
//!
//! # fn main() -> Result<()> {
//! let mut updater = RecordUpdater::open("scan.calvin")?;
//! if let Some(mut ds) = updater.data_set("Default", "Intensities") {
//!     ds.update_value(0, 0, &ColumnValue::Float(9.0))?;
//! }
//! updater.sync()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod equivalence;

pub use crate::core::{
    append_checksum, ones_complement, verify, verify_expected, write_file, CalvinError,
    ColumnInfo, ColumnType, ColumnValue, ContainerConfig, DataGroupHeader, DataSet,
    DataSetHeader, DataSetUpdater, DataSetWriter, FileHeader, FileReader, FileWriter,
    FromColumn, GenericDataHeader, Identifier, IdentifierKind, MetadataUpdateReport,
    MetadataUpdater, Parameter, ParameterList, ParameterValue, RecordUpdater, Result, MAGIC,
    VERSION,
};
pub use crate::equivalence::{compare_files, CompareOptions, Difference, EquivalenceReport, Side};

use memmap2::Mmap;
use parking_lot::Mutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Selects a group or data set by position or by name.
///
/// Name lookups are exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for Lookup<'_> {
    fn from(index: usize) -> Self {
        Lookup::Index(index)
    }
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(name: &'a str) -> Self {
        Lookup::Name(name)
    }
}

impl<'a> From<&'a String> for Lookup<'a> {
    fn from(name: &'a String) -> Self {
        Lookup::Name(name.as_str())
    }
}

/// High-level read access to a Calvin container
///
/// Parses the header once on open and hands out [`DataSet`] planes on
/// demand. With memory mapping enabled, every plane shares one read-only
/// map of the file, created the first time a plane is requested.
///
/// # Examples
///
/// ```rust,no_run
/// use calvin_rs::GenericData;
///
/// let data = GenericData::open("scan.calvin")?;
/// println!("{} ({})", data.header().metadata().file_type(), data.file_identifier());
/// for name in data.data_group_names() {
///     println!("{}: {:?}", name, data.data_set_names(name.as_str()));
/// }
/// # Ok::<(), calvin_rs::CalvinError>(())
/// ```
pub struct GenericData {
    path: PathBuf,
    header: FileHeader,
    config: ContainerConfig,
    shared_map: Mutex<Option<Arc<Mmap>>>,
}

impl GenericData {
    /// Open a container with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, ContainerConfig::default())
    }

    /// Open a container with a custom configuration
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use calvin_rs::{ContainerConfig, GenericData};
    ///
    /// let config = ContainerConfig {
    ///     use_memory_mapping: false,
    ///     load_entire_data_set: true,
    ///     ..Default::default()
    /// };
    /// let data = GenericData::open_with_config("scan.calvin", config)?;
    /// # Ok::<(), calvin_rs::CalvinError>(())
    /// ```
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        let reader = FileReader::open(path.as_ref())?;
        info!(
            "Opened {} ({} groups, {} data sets)",
            path.as_ref().display(),
            reader.header().group_count(),
            reader.header().data_set_total()
        );

        Ok(GenericData {
            path: reader.path().to_path_buf(),
            header: reader.into_header(),
            config,
            shared_map: Mutex::new(None),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifier of the container, from the root metadata header
    pub fn file_identifier(&self) -> &str {
        self.header.metadata().file_id()
    }

    pub fn data_group_count(&self) -> usize {
        self.header.group_count()
    }

    pub fn data_group_names(&self) -> Vec<String> {
        self.header.group_names()
    }

    /// Number of data sets in a group, or `None` if the group is absent
    pub fn data_set_count<'a>(&self, group: impl Into<Lookup<'a>>) -> Option<usize> {
        self.group(group.into()).map(DataGroupHeader::data_set_count)
    }

    pub fn data_set_names<'a>(&self, group: impl Into<Lookup<'a>>) -> Option<Vec<String>> {
        self.group(group.into()).map(DataGroupHeader::data_set_names)
    }

    pub fn find_data_group_header(&self, name: &str) -> Option<&DataGroupHeader> {
        self.header.find_group(name)
    }

    pub fn find_data_set_header<'a>(
        &self,
        group: impl Into<Lookup<'a>>,
        data_set: impl Into<Lookup<'a>>,
    ) -> Option<&DataSetHeader> {
        let group = self.group(group.into())?;
        match data_set.into() {
            Lookup::Index(index) => group.data_set(index),
            Lookup::Name(name) => group.find_data_set(name),
        }
    }

    /// Open a plane onto a data set
    ///
    /// Returns `Ok(None)` when the group or data set does not exist. The
    /// returned plane is already open and independent of any other plane.
    pub fn data_set<'a>(
        &self,
        group: impl Into<Lookup<'a>>,
        data_set: impl Into<Lookup<'a>>,
    ) -> Result<Option<DataSet>> {
        let group = match self.group(group.into()) {
            Some(group) => group,
            None => return Ok(None),
        };
        let header = match data_set.into() {
            Lookup::Index(index) => group.data_set(index),
            Lookup::Name(name) => group.find_data_set(name),
        };
        let header = match header {
            Some(header) => header.clone(),
            None => return Ok(None),
        };

        let mut plane = DataSet::new(&self.path, group.name(), header, &self.config);
        if self.config.use_memory_mapping {
            plane = plane.with_shared_map(self.map()?);
        }
        plane.open()?;
        Ok(Some(plane))
    }

    pub fn set_use_memory_mapping(&mut self, enabled: bool) {
        self.config.use_memory_mapping = enabled;
    }

    pub fn set_load_entire_data_set(&mut self, enabled: bool) {
        self.config.load_entire_data_set = enabled;
    }

    /// Release the cached file map. Planes already handed out keep theirs.
    pub fn clear(&self) {
        if self.shared_map.lock().take().is_some() {
            debug!("Released map of {}", self.path.display());
        }
    }

    fn group(&self, lookup: Lookup<'_>) -> Option<&DataGroupHeader> {
        match lookup {
            Lookup::Index(index) => self.header.group(index),
            Lookup::Name(name) => self.header.find_group(name),
        }
    }

    fn map(&self) -> Result<Arc<Mmap>> {
        let mut cached = self.shared_map.lock();
        if let Some(map) = cached.as_ref() {
            return Ok(Arc::clone(map));
        }

        let file = File::open(&self.path)?;
        // SAFETY: read-only map; writers are kept away from open containers
        let map = Arc::new(unsafe { Mmap::map(&file)? });
        debug!("Mapped {} ({} bytes)", self.path.display(), map.len());
        *cached = Some(Arc::clone(&map));
        Ok(map)
    }
}

impl std::fmt::Debug for GenericData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericData")
            .field("path", &self.path)
            .field("file_id", &self.file_identifier())
            .field("groups", &self.header.group_count())
            .field("mapped", &self.shared_map.lock().is_some())
            .finish()
    }
}

//! Container engine: header tree model, codec, planes and updaters.

pub mod checksum;
pub(crate) mod codec;
pub mod column;
pub mod config;
pub mod dataset;
pub mod error;
pub mod generic;
pub mod group;
pub mod guid;
pub mod header;
pub mod param;
pub mod plane;
pub mod reader;
pub mod updater;
pub mod writer;

pub use checksum::{append_checksum, ones_complement, verify, verify_expected};
pub use column::{ColumnInfo, ColumnType, ColumnValue, FromColumn};
pub use config::ContainerConfig;
pub use dataset::DataSetHeader;
pub use error::{CalvinError, Result};
pub use generic::GenericDataHeader;
pub use group::DataGroupHeader;
pub use guid::{Identifier, IdentifierKind};
pub use header::{FileHeader, MAGIC, VERSION};
pub use param::{Parameter, ParameterList, ParameterValue};
pub use plane::DataSet;
pub use reader::FileReader;
pub use updater::{DataSetUpdater, MetadataUpdateReport, MetadataUpdater, RecordUpdater};
pub use writer::{write_file, DataSetWriter, FileWriter};

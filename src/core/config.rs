//! Container access configuration.
//!
//! ```toml
//! use_memory_mapping = true
//! load_entire_data_set = false
//! default_locale = "en-US"
//! sync_on_finish = true
//! verify_file_size = true
//! ```

use crate::core::error::{CalvinError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

pub const DEFAULT_LOCALE: &str = "en-US";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ContainerConfig {
    /// Read planes through a shared read-only memory map
    pub use_memory_mapping: bool,

    /// Without a memory map, read each plane's whole data region on open
    pub load_entire_data_set: bool,

    /// Locale stamped onto new metadata headers
    #[validate(length(min = 1, max = 64))]
    pub default_locale: String,

    /// Call `sync_all` after the writer's final flush
    pub sync_on_finish: bool,

    /// Re-stat written files and compare against the computed layout size
    pub verify_file_size: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            use_memory_mapping: true,
            load_entire_data_set: false,
            default_locale: DEFAULT_LOCALE.to_string(),
            sync_on_finish: true,
            verify_file_size: true,
        }
    }
}

impl ContainerConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ContainerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CalvinError::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| CalvinError::InvalidConfig(e.to_string()))
    }
}

//! TOML configuration for the extraction and rendering pipeline.
//!
//! Every section is optional; a missing `[[classes]]` list selects the
//! built-in Sentinel-2 SCL table.
//!
//! ```toml
//! no_data = 0
//!
//! [extract]
//! resolution = { exact = 60 }
//!
//! [render]
//! title = "Scene classification"
//! font_size = 14.0
//!
//! [[classes]]
//! code = 0
//! label = "No Data"
//! color = [0, 0, 0]
//! ```

use crate::core::classes::{ClassDefinition, ClassEntry};
use crate::core::renderer::RenderOptions;
use crate::io::extractor::ExtractOptions;
use crate::types::{ClassCode, SclError, SclResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub extract: ExtractOptions,
    pub render: RenderOptions,
    /// Replacement class table, in legend order
    pub classes: Option<Vec<ClassEntry>>,
    /// Reserved no-data code of the replacement table
    pub no_data: Option<ClassCode>,
}

impl MapConfig {
    pub fn from_toml_str(content: &str) -> SclResult<Self> {
        toml::from_str(content).map_err(|e| SclError::Config(format!("invalid configuration: {}", e)))
    }

    /// Load a configuration file once at startup
    pub fn load<P: AsRef<Path>>(path: P) -> SclResult<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The class table this configuration selects
    pub fn class_definition(&self) -> SclResult<ClassDefinition> {
        match &self.classes {
            Some(entries) => {
                let table = ClassDefinition::new(entries.clone())?;
                match self.no_data {
                    Some(code) => table.with_no_data(code),
                    None => Ok(table),
                }
            }
            None => {
                if self.no_data.is_some() {
                    log::warn!("no_data is ignored without a [[classes]] table");
                }
                Ok(ClassDefinition::scl().clone())
            }
        }
    }
}

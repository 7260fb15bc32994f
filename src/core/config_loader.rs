//! # Config Loader
//!
//! Loads the optional `config.toml` that seeds every session: default properties, color
//! preference, and a default location for the JSON run report.

use crate::core::paths::{self, PathError};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file '{0}' not found.")]
    NotFound(PathBuf),
    #[error("I/O error while reading configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file exists but is not valid TOML for `ProcessorConfig`.
    #[error("Failed to parse TOML file at '{path}': {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Path(#[from] PathError),
}

/// The contents of `config.toml`. Every field is optional.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Seeded into the property store after the built-ins. Non-string TOML values are
    /// stored in their TOML text form (`true`, `42`, `1.5`).
    pub properties: BTreeMap<String, toml::Value>,
    /// Forces colored output on or off; unset means auto-detect.
    pub color: Option<bool>,
    /// Default path of the JSON run report. `~` and `$VAR` are expanded.
    pub report_file: Option<String>,
}

impl ProcessorConfig {
    /// Loads the configuration.
    ///
    /// With an explicit path the file must exist. Without one, the default location is
    /// used and a missing file simply yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (paths::get_default_config_path()?, false),
        };

        if !path.exists() {
            if required {
                return Err(ConfigError::NotFound(path));
            }
            log::debug!("No configuration at '{}'; using defaults.", path.display());
            return Ok(Self::default());
        }

        log::debug!("Loading configuration from '{}'", path.display());
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content, &path)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The `[properties]` table as `(name, value)` strings.
    pub fn property_values(&self) -> impl Iterator<Item = (&str, String)> {
        self.properties.iter().map(|(name, value)| {
            let text = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.as_str(), text)
        })
    }

    /// The expanded `report_file`, if configured.
    pub fn report_path(&self) -> anyhow::Result<Option<PathBuf>> {
        self.report_file
            .as_deref()
            .map(paths::expand_path_template)
            .transpose()
    }
}

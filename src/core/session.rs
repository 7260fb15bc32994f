// src/core/session.rs

use crate::core::config_loader::ProcessorConfig;
use crate::core::interpolator::{Expansion, Interpolator};
use crate::core::paths;
use crate::core::properties::{PropertySource, PropertyStore};
use crate::core::registry::EntityRegistry;
use crate::constants::builtin;
use crate::system::engine::{GeoEngine, GeoJsonEngine, Layer};
use std::path::{Path, PathBuf};

/// Everything one processing run owns: its properties, its layers and the engine that
/// does the geospatial work. Two sessions never share state.
#[derive(Debug)]
pub struct Session {
    pub properties: PropertyStore,
    pub layers: EntityRegistry<Layer>,
    engine: Box<dyn GeoEngine>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with built-in properties and the GeoJSON engine.
    pub fn new() -> Self {
        Self::with_engine(Box::new(GeoJsonEngine))
    }

    pub fn with_engine(engine: Box<dyn GeoEngine>) -> Self {
        Self {
            properties: PropertyStore::with_builtins(),
            layers: EntityRegistry::new(),
            engine,
        }
    }

    /// Builds a session in property precedence order: built-ins, then the config file's
    /// `[properties]`, then `Name=Value` overrides from the command line.
    pub fn from_config<S: AsRef<str>>(config: &ProcessorConfig, overrides: &[S]) -> Self {
        let mut session = Self::new();
        for (name, value) in config.property_values() {
            session
                .properties
                .set_with_source(name, value, PropertySource::Config);
        }
        let applied = session.properties.apply_overrides(overrides);
        log::debug!(
            "Session created with {} properties ({} from the command line)",
            session.properties.len(),
            applied
        );
        session
    }

    pub fn engine(&self) -> &dyn GeoEngine {
        self.engine.as_ref()
    }

    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.set(name, value);
    }

    pub fn expand(&self, text: &str) -> Expansion {
        Interpolator::new(&self.properties).expand_tracked(text)
    }

    /// Resolves a path parameter against the `WorkingDir` property.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        match self.properties.get(builtin::WORKING_DIR) {
            Some(dir) => paths::resolve_path(dir, path),
            None => PathBuf::from(path),
        }
    }

    /// Records the command file being run: sets `CommandFile` and moves `WorkingDir` to its
    /// directory (unless `WorkingDir` was pinned on the command line).
    pub fn enter_command_file(&mut self, file: &Path) {
        let file = dunce::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        self.properties
            .set_builtin(builtin::COMMAND_FILE, paths::display_path(&file));
        if let Some(dir) = file.parent() {
            self.properties.set_working_dir(&paths::display_path(dir));
        }
    }
}

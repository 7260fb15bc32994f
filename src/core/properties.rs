// src/core/properties.rs

//! # Property Store
//!
//! Session-wide `name -> value` table. Built-in properties are seeded when a session starts;
//! the configuration file, command-line overrides and commands may shadow them, but a
//! built-in is never removed.

use crate::constants::builtin;
use crate::core::paths;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where a property's current value came from.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    BuiltIn,
    Config,
    CommandLine,
    Command,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub value: String,
    pub source: PropertySource,
    /// Sticky: set when the property was first seeded as a built-in.
    pub builtin: bool,
}

/// The property table of one processing session.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    properties: BTreeMap<String, Property>,
}

impl PropertyStore {
    /// An empty store, without built-ins. Mostly useful in tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the built-in properties of the running process.
    pub fn with_builtins() -> Self {
        let mut store = Self::new();
        for (name, value) in paths::builtin_properties() {
            store.set_builtin(name, value);
        }
        store
    }

    pub(crate) fn set_builtin(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(
            name.to_string(),
            Property {
                value: value.into(),
                source: PropertySource::BuiltIn,
                builtin: true,
            },
        );
    }

    /// Sets a property as a command would at run time.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_with_source(name, value, PropertySource::Command);
    }

    pub fn set_with_source(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        source: PropertySource,
    ) {
        let name = name.into();
        let builtin = self.is_builtin(&name);
        log::trace!("Setting property '{}' ({:?})", name, source);
        self.properties.insert(
            name,
            Property {
                value: value.into(),
                source,
                builtin,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|p| p.value.as_str())
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn source(&self, name: &str) -> Option<PropertySource> {
        self.properties.get(name).map(|p| p.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.properties.get(name).is_some_and(|p| p.builtin)
    }

    /// Removes a user property. Built-ins are refused and `false` is returned.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.is_builtin(name) {
            log::warn!("Refusing to remove built-in property '{}'.", name);
            return false;
        }
        self.properties.remove(name).is_some()
    }

    /// Property names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, p)| (k.as_str(), p.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Applies `Name=Value` overrides from the command line. Malformed entries are dropped
    /// with a warning. Returns the number of entries applied.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> usize {
        let mut applied = 0;
        for entry in overrides {
            match parse_override(entry.as_ref()) {
                Some((name, value)) => {
                    self.set_with_source(name, value, PropertySource::CommandLine);
                    applied += 1;
                }
                None => log::warn!(
                    "Ignoring malformed property override '{}' (expected Name=Value).",
                    entry.as_ref()
                ),
            }
        }
        applied
    }

    /// Sets `WorkingDir` unless the user pinned it on the command line.
    pub fn set_working_dir(&mut self, dir: &str) {
        if self.source(builtin::WORKING_DIR) == Some(PropertySource::CommandLine) {
            log::debug!("Keeping command-line WorkingDir; not switching to '{}'.", dir);
            return;
        }
        let source = self
            .source(builtin::WORKING_DIR)
            .unwrap_or(PropertySource::BuiltIn);
        self.set_with_source(builtin::WORKING_DIR, dir, source);
    }
}

/// Splits `Name=Value` on the first `=`. The name is trimmed and must be non-empty.
pub fn parse_override(entry: &str) -> Option<(&str, &str)> {
    let (name, value) = entry.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

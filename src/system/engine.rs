// src/system/engine.rs

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineFault {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("'{path}' is not a valid layer: {reason}")]
    Format { path: String, reason: String },
    #[error("Operation not supported by this engine: {0}")]
    Unsupported(String),
}

/// An opaque spatial data set held in the layer registry.
///
/// The processor never looks inside; only the engine that produced a layer interprets
/// its `document`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// File the layer was read from, if any.
    pub source: Option<PathBuf>,
    pub document: Value,
}

impl Layer {
    pub fn new(document: Value) -> Self {
        Self {
            source: None,
            document,
        }
    }

    /// Number of features, for layers shaped like a GeoJSON FeatureCollection.
    pub fn feature_count(&self) -> usize {
        self.document
            .get("features")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// The boundary between commands and whatever does the actual geospatial work.
/// Calls are synchronous and made from within a command's `execute`.
pub trait GeoEngine: std::fmt::Debug {
    fn read_layer(&self, path: &Path) -> Result<Layer, EngineFault>;
    fn write_layer(&self, layer: &Layer, path: &Path) -> Result<(), EngineFault>;
    fn merge_layers(&self, layers: &[&Layer]) -> Result<Layer, EngineFault>;
}

/// Reads and writes GeoJSON. A lone `Feature` is promoted to a one-feature collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonEngine;

impl GeoJsonEngine {
    fn normalize(path: &Path, document: Value) -> Result<Value, EngineFault> {
        let format_error = |reason: &str| EngineFault::Format {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        match document.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                if document.get("features").is_some_and(Value::is_array) {
                    Ok(document)
                } else {
                    Err(format_error("FeatureCollection has no 'features' array"))
                }
            }
            Some("Feature") => Ok(json!({
                "type": "FeatureCollection",
                "features": [document],
            })),
            Some(other) => Err(format_error(&format!("unexpected GeoJSON type '{}'", other))),
            None => Err(format_error("missing 'type' member")),
        }
    }
}

impl GeoEngine for GeoJsonEngine {
    fn read_layer(&self, path: &Path) -> Result<Layer, EngineFault> {
        log::debug!("Reading GeoJSON layer from '{}'", path.display());
        let content = fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&content)?;
        Ok(Layer {
            source: Some(path.to_path_buf()),
            document: Self::normalize(path, document)?,
        })
    }

    fn write_layer(&self, layer: &Layer, path: &Path) -> Result<(), EngineFault> {
        log::debug!("Writing {} features to '{}'", layer.feature_count(), path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&layer.document)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn merge_layers(&self, layers: &[&Layer]) -> Result<Layer, EngineFault> {
        let mut features = Vec::new();
        for layer in layers {
            match layer.document.get("features").and_then(Value::as_array) {
                Some(items) => features.extend(items.iter().cloned()),
                None => {
                    return Err(EngineFault::Unsupported(
                        "merging layers that are not feature collections".to_string(),
                    ));
                }
            }
        }
        Ok(Layer::new(json!({
            "type": "FeatureCollection",
            "features": features,
        })))
    }
}

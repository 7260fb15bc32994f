// src/commands/layers.rs

//! Layer commands. They only move layers between files and the registry; every data
//! operation is delegated to the session's `GeoEngine`.

use super::{Command, CommandContext};
use crate::core::interpolator::expand_formatter;
use crate::core::parameters::ParameterSpec;
use crate::core::paths;
use crate::core::registry::IdCollisionPolicy;
use crate::system::engine::{EngineFault, Layer};

const IF_ID_EXISTS: ParameterSpec =
    ParameterSpec::optional("IfIDExists").choices(IdCollisionPolicy::CHOICES);

pub const READ_LAYER_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Path"),
    ParameterSpec::optional("ID"),
    IF_ID_EXISTS,
];

pub const WRITE_LAYER_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("ID"),
    ParameterSpec::required("Path"),
];

pub const COPY_LAYER_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("ID"),
    ParameterSpec::optional("CopiedID"),
    IF_ID_EXISTS,
];

pub const MERGE_LAYERS_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("IDs").scalar_or_list(),
    ParameterSpec::required("OutputID"),
    IF_ID_EXISTS,
];

pub const FREE_LAYER_PARAMETERS: &[ParameterSpec] =
    &[ParameterSpec::required("IDs").scalar_or_list()];

/// Default `ID` of `ReadLayer`: the input file name without extension.
const DEFAULT_READ_ID: &str = "%F";

/// `ReadLayer(Path=..., ID=..., IfIDExists=...)`
#[derive(Debug, Default)]
pub struct ReadLayer;

impl Command for ReadLayer {
    fn discover(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let path_text = ctx.param_or("Path", "");
        let path = ctx.resolve_path(&path_text);
        if !path.is_file() {
            ctx.fail(
                format!("Input file '{}' does not exist.", path.display()),
                "Check the Path parameter and the WorkingDir property.",
            );
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let path_text = ctx.param_or("Path", "");
        let path = ctx.resolve_path(&path_text);
        let id_format = ctx.param_or("ID", DEFAULT_READ_ID);
        let id = expand_formatter(&paths::display_path(&path), &id_format);
        let Some(policy) = ctx.collision_policy() else {
            return Ok(());
        };
        if id.trim().is_empty() {
            ctx.fail(
                format!("ID '{}' produced an empty layer ID.", id_format),
                "Specify a non-empty ID.",
            );
            return Ok(());
        }

        let layer = ctx.session.engine().read_layer(&path)?;
        let features = layer.feature_count();
        if ctx.put_layer(&id, layer, policy) {
            log::info!("Read layer '{}' ({} features) from '{}'", id, features, path.display());
        }
        Ok(())
    }
}

/// `WriteLayer(ID=..., Path=...)`
#[derive(Debug, Default)]
pub struct WriteLayer;

impl Command for WriteLayer {
    fn discover(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let id = ctx.param_or("ID", "");
        ctx.require_layer(&id);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let id = ctx.param_or("ID", "");
        let path_text = ctx.param_or("Path", "");
        let path = ctx.resolve_path(&path_text);

        let session = &*ctx.session;
        match session.layers.get(&id) {
            Some(layer) => session.engine().write_layer(layer, &path)?,
            None => {
                ctx.fail(
                    format!("Layer '{}' does not exist.", id),
                    "Read or create the layer before this command.",
                );
                return Ok(());
            }
        }
        log::info!("Wrote layer '{}' to '{}'", id, path.display());
        Ok(())
    }
}

/// `CopyLayer(ID=..., CopiedID=..., IfIDExists=...)`; `CopiedID` defaults to `<ID>_Copy`.
#[derive(Debug, Default)]
pub struct CopyLayer;

impl Command for CopyLayer {
    fn discover(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let id = ctx.param_or("ID", "");
        ctx.require_layer(&id);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let id = ctx.param_or("ID", "");
        let copied_id = ctx.param_or("CopiedID", &format!("{}_Copy", id));
        let Some(policy) = ctx.collision_policy() else {
            return Ok(());
        };

        let Some(copy) = ctx.session.layers.get(&id).cloned() else {
            ctx.require_layer(&id);
            return Ok(());
        };
        ctx.put_layer(&copied_id, copy, policy);
        Ok(())
    }
}

/// `MergeLayers(IDs=[...], OutputID=..., IfIDExists=...)`
#[derive(Debug, Default)]
pub struct MergeLayers;

impl Command for MergeLayers {
    fn discover(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        for id in ctx.list_param("IDs").unwrap_or_default() {
            ctx.require_layer(&id);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let ids = ctx.list_param("IDs").unwrap_or_default();
        let output_id = ctx.param_or("OutputID", "");
        let Some(policy) = ctx.collision_policy() else {
            return Ok(());
        };
        if ids.is_empty() {
            ctx.fail("No layers to merge.", "List at least one layer in IDs.");
            return Ok(());
        }

        let session = &*ctx.session;
        let inputs: Vec<&Layer> = ids.iter().filter_map(|id| session.layers.get(id)).collect();
        if inputs.len() != ids.len() {
            for id in &ids {
                ctx.require_layer(id);
            }
            return Ok(());
        }
        let merged = session.engine().merge_layers(&inputs)?;
        log::info!(
            "Merged {} layers into '{}' ({} features)",
            ids.len(),
            output_id,
            merged.feature_count()
        );
        ctx.put_layer(&output_id, merged, policy);
        Ok(())
    }
}

/// `FreeLayer(IDs=[...])`: drops layers from the session. Unknown IDs only warn.
#[derive(Debug, Default)]
pub struct FreeLayer;

impl Command for FreeLayer {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        for id in ctx.list_param("IDs").unwrap_or_default() {
            if ctx.session.layers.free(&id).is_none() {
                ctx.warn(
                    format!("Layer '{}' does not exist; nothing to free.", id),
                    "Check the IDs parameter.",
                );
            }
        }
        Ok(())
    }
}

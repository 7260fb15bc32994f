// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILENAME, builtin};
use anyhow::{Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
}

/// Returns the processor configuration directory (`~/.config/geoprocessor` on Linux).
/// The directory is not created; a missing directory simply means "no configuration".
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Returns the path to the default `config.toml`.
pub fn get_default_config_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user-supplied path.
pub fn expand_path_template(template: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(template)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", template, e))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Resolves `path` against `working_dir` when it is relative.
pub fn resolve_path(working_dir: &str, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        Path::new(working_dir).join(candidate)
    };
    dunce::simplified(&absolute).to_path_buf()
}

/// Renders a path the way it is stored in properties.
pub fn display_path(path: &Path) -> String {
    dunce::simplified(path).to_string_lossy().to_string()
}

/// Computes the built-in properties of the running process.
/// Values that cannot be determined (e.g. no home directory) are left out.
pub fn builtin_properties() -> Vec<(&'static str, String)> {
    let mut props = vec![
        (builtin::PROGRAM_NAME, env!("CARGO_PKG_NAME").to_string()),
        (builtin::PROGRAM_VERSION, env!("CARGO_PKG_VERSION").to_string()),
        (builtin::TEMP_DIR, display_path(&env::temp_dir())),
    ];

    match env::current_dir() {
        Ok(dir) => props.push((builtin::WORKING_DIR, display_path(&dir))),
        Err(e) => log::warn!("Could not determine the current directory: {}", e),
    }
    if let Some(home) = dirs::home_dir() {
        props.push((builtin::USER_HOME_DIR, display_path(&home)));
    }
    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        props.push((builtin::USER_NAME, user));
    }
    if let Some(install_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        props.push((builtin::INSTALL_DIR, display_path(&install_dir)));
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute_paths() {
        let base = env::temp_dir();
        let base_str = display_path(&base);
        assert_eq!(resolve_path(&base_str, "a.geojson"), base.join("a.geojson"));

        let absolute = base.join("b.geojson");
        let absolute_str = display_path(&absolute);
        assert_eq!(resolve_path("/ignored", &absolute_str), absolute);
    }

    #[test]
    fn test_builtin_properties_include_program_identity() {
        let props = builtin_properties();
        let names: Vec<&str> = props.iter().map(|(n, _)| *n).collect();
        assert!(names.contains(&builtin::PROGRAM_NAME));
        assert!(names.contains(&builtin::PROGRAM_VERSION));
        assert!(names.contains(&builtin::TEMP_DIR));
        assert!(
            props
                .iter()
                .any(|(n, v)| *n == builtin::PROGRAM_NAME && v == "geoprocessor")
        );
    }

    #[test]
    fn test_expand_path_template_passes_plain_paths_through() {
        let path = expand_path_template("reports/run.json").unwrap();
        assert_eq!(path, PathBuf::from("reports/run.json"));
    }

    #[test]
    fn test_config_path_ends_with_config_file() {
        if let Ok(path) = get_default_config_path() {
            assert!(path.ends_with(Path::new(CONFIG_DIR_NAME).join(CONFIG_FILENAME)));
        }
    }
}

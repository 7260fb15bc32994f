// src/constants.rs

/// The name of the directory (under the system config dir) holding processor configuration.
pub const CONFIG_DIR_NAME: &str = "geoprocessor";

/// The name of the optional configuration file inside the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Recommendation attached to FAILURE records produced from unexpected engine faults.
pub const SEE_LOG_RECOMMENDATION: &str = "See the log file for details.";

/// Names of the properties every session starts with.
pub mod builtin {
    pub const WORKING_DIR: &str = "WorkingDir";
    pub const TEMP_DIR: &str = "TempDir";
    pub const USER_HOME_DIR: &str = "UserHomeDir";
    pub const USER_NAME: &str = "UserName";
    pub const PROGRAM_NAME: &str = "ProgramName";
    pub const PROGRAM_VERSION: &str = "ProgramVersion";
    pub const INSTALL_DIR: &str = "InstallDir";
    /// Set when a command file is run, not at session start.
    pub const COMMAND_FILE: &str = "CommandFile";
}

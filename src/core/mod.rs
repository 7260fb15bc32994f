// src/core/mod.rs

pub mod config_loader;
pub mod interpolator;
pub mod parameters;
pub mod parser;
pub mod paths;
pub mod processor;
pub mod properties;
pub mod registry;
pub mod session;
pub mod status;

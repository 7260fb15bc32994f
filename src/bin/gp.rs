// src/bin/gp.rs

use clap::Parser;
use colored::*;
use geoprocessor::cli::{self, Cli};

/// The main entry point of the `gp` application.
/// It sets up logging, runs the processor and performs centralized error handling.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match cli::run(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // --- Centralized Error Handling ---
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

// src/cli/mod.rs

use crate::core::{
    config_loader::ProcessorConfig,
    processor::{Processor, RunReport},
    session::Session,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

pub mod interactive;
pub mod report;

/// gp: runs GeoProcessor command files, or commands typed at a prompt.
///
/// Each line of a command file is `CommandName(Param="value", List=[a,b])`. Lines run in
/// order; a failing line is reported and the run continues.
///
/// Exit codes: 0 when every command succeeded, 1 on any failure, 2 on warnings only.
#[derive(Parser, Debug)]
#[command(name = "gp", author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The command file to run. Without one, an interactive prompt starts.
    pub command_file: Option<PathBuf>,

    /// Set a property before the first command runs (e.g., "OutputDir=/tmp/out").
    #[arg(short = 'p', long = "property", value_name = "NAME=VALUE")]
    pub properties: Vec<String>,

    /// Configuration file to use instead of the default one.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start the interactive prompt (after running COMMAND_FILE, if given).
    #[arg(short, long)]
    pub interactive: bool,

    /// Write the run report as JSON to this file.
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Print only the summary line.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Runs the processor as described by `cli` and returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let config = ProcessorConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(color) = config.color {
        colored::control::set_override(color);
    }

    let mut processor = Processor::new(Session::from_config(&config, &cli.properties));

    let mut run_report = RunReport::default();
    if let Some(file) = &cli.command_file {
        run_report = processor
            .run_file(file)
            .with_context(|| format!("Cannot run '{}'", file.display()))?;
        report::print_report(&run_report, cli.quiet);
    }
    if cli.command_file.is_none() || (cli.interactive && !run_report.exited) {
        run_report.absorb(interactive::run_prompt(&mut processor, cli.quiet)?);
    }

    let report_path = match cli.report {
        Some(path) => Some(path),
        None => config.report_path()?,
    };
    if let Some(path) = report_path {
        report::write_json(&run_report, &path)?;
    }

    Ok(run_report.exit_code())
}

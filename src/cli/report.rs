// src/cli/report.rs

use crate::core::processor::{CommandReport, RunReport};
use crate::core::status::{Phase, Severity};
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

fn paint(severity: Severity, text: String) -> ColoredString {
    match severity {
        Severity::Unknown => text.dimmed(),
        Severity::Success => text.green(),
        Severity::Warning => text.yellow().bold(),
        Severity::Failure => text.red().bold(),
    }
}

/// Severity label padded before coloring, so ANSI codes do not break alignment.
fn cell(severity: Severity) -> ColoredString {
    paint(severity, format!("{:<9}", severity.to_string()))
}

/// Prints one row per command followed by its WARNING and FAILURE records.
pub fn print_commands(commands: &[CommandReport]) {
    if commands.is_empty() {
        return;
    }
    println!(
        "\n{:>5}  {:<24} {:<9} {:<9} {:<9}",
        "Line".bold(),
        "Command".bold(),
        "Init".bold(),
        "Discovery".bold(),
        "Run".bold()
    );

    for command in commands {
        let severity_of = |p: Phase| {
            command
                .phases
                .iter()
                .find(|(candidate, _)| *candidate == p)
                .map_or(Severity::Unknown, |(_, s)| *s)
        };
        println!(
            "{:>5}  {:<24} {} {} {}",
            command.line,
            command.name.cyan(),
            cell(severity_of(Phase::Initialization)),
            cell(severity_of(Phase::Discovery)),
            cell(severity_of(Phase::Run))
        );

        for (phase, record) in &command.records {
            if record.severity < Severity::Warning {
                continue;
            }
            println!(
                "         {} [{}] {}",
                paint(record.severity, record.severity.to_string()),
                phase,
                record.message
            );
            if !record.recommendation.is_empty() {
                println!("           {}", record.recommendation.dimmed());
            }
        }
    }
}

pub fn print_summary(report: &RunReport) {
    let failures = report.count(Severity::Failure);
    let warnings = report.count(Severity::Warning);
    let mut summary = format!(
        "{} commands, {} failed, {} with warnings",
        report.commands.len(),
        failures,
        warnings
    );
    if report.exited {
        summary.push_str(", stopped by Exit()");
    }
    println!("\n{}: {}", paint(report.severity, report.severity.to_string()), summary);
}

pub fn print_report(report: &RunReport, quiet: bool) {
    if !quiet {
        print_commands(&report.commands);
    }
    print_summary(report);
}

/// Writes the report as pretty JSON, creating parent directories as needed.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write run report to '{}'", path.display()))?;
    log::info!("Run report written to '{}'", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processor::Processor;
    use crate::core::session::Session;
    use tempfile::tempdir;

    #[test]
    fn test_write_json_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        let mut processor = Processor::new(Session::new());
        let report = processor.run_text("Message(Message=\"done\")");

        write_json(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["severity"], "SUCCESS");
        assert_eq!(value["commands"][0]["records"][0][1]["message"], "done");
    }
}

// src/cli/interactive.rs

use crate::cli::report;
use crate::commands::COMMAND_REGISTRY;
use crate::core::processor::{Processor, RunReport};
use anyhow::Result;
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};

/// Words the prompt handles itself instead of passing to the processor.
enum PromptAction {
    Quit,
    Help,
    Properties,
    Layers,
    Command,
}

fn classify(line: &str) -> PromptAction {
    match line.to_ascii_lowercase().as_str() {
        "exit" | "quit" => PromptAction::Quit,
        "help" | "?" => PromptAction::Help,
        "properties" => PromptAction::Properties,
        "layers" => PromptAction::Layers,
        _ => PromptAction::Command,
    }
}

fn print_help() {
    println!("\n{}", "Commands:".bold());
    for def in COMMAND_REGISTRY {
        let params: Vec<String> = def
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect();
        println!("  {:<22} {}", def.name.cyan(), def.summary);
        if !params.is_empty() {
            println!("  {:<22} {}", "", params.join(", ").dimmed());
        }
    }
    println!(
        "\n{}",
        "Also: 'properties', 'layers', 'help', 'exit'.".dimmed()
    );
}

fn print_properties(processor: &Processor) {
    for (name, value) in processor.session().properties.iter() {
        println!("  {:<20} {}", name.blue(), value);
    }
}

fn print_layers(processor: &Processor) {
    let layers = &processor.session().layers;
    if layers.is_empty() {
        println!("  {}", "(no layers)".dimmed());
    }
    for id in layers.ids() {
        let features = layers.get(id).map_or(0, |l| l.feature_count());
        println!("  {:<20} {} features", id.blue(), features);
    }
}

/// Reads commands from the terminal and runs each against the processor's session until
/// `exit`, `quit` or an `Exit()` command. Returns the accumulated report.
pub fn run_prompt(processor: &mut Processor, quiet: bool) -> Result<RunReport> {
    println!(
        "{}",
        "GeoProcessor interactive mode. Type a command, 'help' or 'exit'.".dimmed()
    );

    let mut total = RunReport::default();
    loop {
        let line: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("gp")
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match classify(line) {
            PromptAction::Quit => break,
            PromptAction::Help => print_help(),
            PromptAction::Properties => print_properties(processor),
            PromptAction::Layers => print_layers(processor),
            PromptAction::Command => {
                let result = processor.run_text(line);
                if !quiet {
                    report::print_commands(&result.commands);
                }
                let exited = result.exited;
                total.absorb(result);
                if exited {
                    break;
                }
            }
        }
    }

    report::print_summary(&total);
    Ok(total)
}

// src/core/processor.rs

//! # Processor
//!
//! Drives a script through the command lifecycle. Lines run strictly in order; a failing
//! line is recorded and the run moves on, so one pass reports every problem in the script.
//! The only fatal error is a command file that cannot be read.

use crate::commands::{
    self, BlockKind, BlockRole, Command, CommandContext, CommandDefinition, Flow, log_record,
};
use crate::constants::SEE_LOG_RECOMMENDATION;
use crate::core::parameters::validate_parameters;
use crate::core::parser;
use crate::core::session::Session;
use crate::core::status::{CommandStatus, LogRecord, Phase, Severity};
use crate::models::{Script, ScriptLine};
use crate::system::engine::EngineFault;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Command file '{0}' not found.")]
    NotFound(PathBuf),
    #[error("Could not read command file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// --- RUN REPORT ---

/// Outcome of one script line.
#[derive(Serialize, Debug, Clone)]
pub struct CommandReport {
    pub line: usize,
    pub text: String,
    pub name: String,
    pub severity: Severity,
    pub phases: Vec<(Phase, Severity)>,
    pub records: Vec<(Phase, LogRecord)>,
}

/// Outcome of a whole run, in script order.
#[derive(Serialize, Debug, Clone, Default)]
pub struct RunReport {
    pub commands: Vec<CommandReport>,
    /// Max over all command severities.
    pub severity: Severity,
    /// Set when `Exit()` stopped the run.
    pub exited: bool,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }

    /// Number of commands that ended with `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.commands.iter().filter(|c| c.severity == severity).count()
    }

    /// Appends another report, as the interactive prompt does line by line.
    pub fn absorb(&mut self, other: Self) {
        self.severity = self.severity.max(other.severity);
        self.exited |= other.exited;
        self.commands.extend(other.commands);
    }
}

// --- BLOCK MATCHING ---

/// `If`/`For` openers paired with their closers by `Name`, plus lines that could not be
/// paired.
#[derive(Debug, Default)]
struct BlockMap {
    partners: HashMap<usize, usize>,
    errors: HashMap<usize, String>,
}

fn closer_name(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::If => "EndIf",
        BlockKind::For => "EndFor",
    }
}

fn match_blocks(
    lines: &[ScriptLine],
    definitions: &[Option<&'static CommandDefinition>],
) -> BlockMap {
    let mut map = BlockMap::default();
    let mut open: Vec<(usize, BlockKind, String)> = Vec::new();

    for (index, (line, definition)) in lines.iter().zip(definitions).enumerate() {
        let (Ok(parsed), Some(definition)) = (&line.parsed, definition) else {
            continue;
        };
        let Some(role) = definition.block else {
            continue;
        };
        let name = parsed.scalar("Name").unwrap_or_default().trim().to_string();

        match role {
            BlockRole::Open(kind) => open.push((index, kind, name)),
            BlockRole::Close(kind) => {
                let Some(position) = open.iter().rposition(|(_, k, n)| *k == kind && *n == name)
                else {
                    let message = format!(
                        "{} '{}' has no matching {:?} before it.",
                        closer_name(kind),
                        name,
                        kind
                    );
                    map.errors.insert(index, message);
                    continue;
                };
                for (inner, inner_kind, inner_name) in open.drain(position + 1..) {
                    map.errors.insert(
                        inner,
                        format!(
                            "{:?} '{}' is not closed before line {}.",
                            inner_kind, inner_name, line.number
                        ),
                    );
                }
                if let Some((opener, _, _)) = open.pop() {
                    map.partners.insert(opener, index);
                    map.partners.insert(index, opener);
                }
            }
        }
    }

    for (index, kind, name) in open {
        map.errors.insert(
            index,
            format!("{:?} '{}' has no matching {}.", kind, name, closer_name(kind)),
        );
    }
    map
}

// --- DRIVER ---

/// Per-line state for the duration of one run.
struct Slot {
    definition: Option<&'static CommandDefinition>,
    command: Option<Box<dyn Command>>,
    status: CommandStatus,
}

impl Slot {
    fn new(definition: Option<&'static CommandDefinition>) -> Self {
        Self {
            definition,
            command: None,
            status: CommandStatus::new(),
        }
    }

    fn fail_initialization(
        &mut self,
        line: usize,
        message: String,
        recommendation: impl Into<String>,
    ) {
        log_record(line, Phase::Initialization, Severity::Failure, &message);
        self.status
            .add_record(Phase::Initialization, Severity::Failure, message, recommendation);
    }

    /// Builds and validates the command. Runs once per line, before anything executes.
    fn initialize(&mut self, line: &ScriptLine, block_error: Option<&String>) {
        let parsed = match &line.parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                let message = format!("Syntax error: {}", e);
                self.fail_initialization(line.number, message, e.recommendation());
                return;
            }
        };
        let Some(definition) = self.definition else {
            self.fail_initialization(
                line.number,
                format!("Unrecognized command '{}'.", parsed.name),
                "Check the command name spelling.",
            );
            return;
        };

        let mut command = (definition.constructor)();
        let errors = validate_parameters(parsed, definition.parameters);
        if errors.is_empty() {
            if let Err(e) = command.validate(parsed) {
                self.fail_initialization(line.number, e.to_string(), e.recommendation());
            }
        }
        for e in errors {
            self.fail_initialization(line.number, e.to_string(), e.recommendation());
        }
        if let Some(message) = block_error {
            self.fail_initialization(
                line.number,
                message.clone(),
                "Pair each block with a closing command of the same Name.",
            );
        }

        self.status.refresh(Phase::Initialization, Severity::Success);
        self.command = Some(command);
    }

    fn failed(&self) -> bool {
        self.status.failed(Phase::Initialization)
    }

    /// A failed `If` or `For` must not let its body run unguarded.
    fn is_opener(&self) -> bool {
        matches!(
            self.definition.and_then(|d| d.block),
            Some(BlockRole::Open(_))
        )
    }

    fn report(&self, line: &ScriptLine) -> CommandReport {
        let name = match &line.parsed {
            Ok(parsed) => parsed.name.clone(),
            Err(_) => line.text.split('(').next().unwrap_or_default().trim().to_string(),
        };
        CommandReport {
            line: line.number,
            text: line.text.clone(),
            name,
            severity: self.status.overall_severity(),
            phases: Phase::ALL
                .iter()
                .map(|p| (*p, self.status.phase_severity(*p)))
                .collect(),
            records: self
                .status
                .all_records()
                .map(|(phase, record)| (phase, record.clone()))
                .collect(),
        }
    }
}

fn record_fault(ctx: &mut CommandContext<'_>, fault: &EngineFault) {
    log::error!("Line {}: unexpected engine error: {:?}", ctx.line, fault);
    ctx.fail(format!("Unexpected error: {}", fault), SEE_LOG_RECOMMENDATION);
}

/// Reads and parses a command file. Missing or unreadable files are the only fatal error.
pub fn read_script(path: &Path) -> Result<Script, ProcessorError> {
    if !path.exists() {
        return Err(ProcessorError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ProcessorError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parser::parse_script(&text))
}

/// Runs scripts against one session. The session persists across runs, which is what the
/// interactive prompt relies on.
#[derive(Debug)]
pub struct Processor {
    session: Session,
}

impl Processor {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Reads `path`, points `CommandFile`/`WorkingDir` at it and runs it.
    pub fn run_file(&mut self, path: &Path) -> Result<RunReport, ProcessorError> {
        let script = read_script(path)?;
        self.session.enter_command_file(path);
        log::info!("Running {} commands from '{}'", script.len(), path.display());
        Ok(self.run(&script))
    }

    /// Parses and runs text typed at the prompt.
    pub fn run_text(&mut self, text: &str) -> RunReport {
        self.run(&parser::parse_script(text))
    }

    pub fn run(&mut self, script: &Script) -> RunReport {
        let definitions: Vec<Option<&'static CommandDefinition>> = script
            .lines
            .iter()
            .map(|line| {
                line.parsed
                    .as_ref()
                    .ok()
                    .and_then(|parsed| commands::find_command(&parsed.name))
            })
            .collect();
        let blocks = match_blocks(&script.lines, &definitions);
        let mut slots: Vec<Slot> = definitions.into_iter().map(Slot::new).collect();

        // Every line is validated up front, so problems inside blocks that never run are
        // still reported.
        for (index, (line, slot)) in script.lines.iter().zip(slots.iter_mut()).enumerate() {
            slot.initialize(line, blocks.errors.get(&index));
        }

        let mut exited = false;
        let mut pc = 0;
        loop {
            let (Some(line), Some(slot)) = (script.lines.get(pc), slots.get_mut(pc)) else {
                break;
            };
            let flow = self.step(line, slot);
            pc = match flow {
                Flow::Continue => pc + 1,
                Flow::SkipBlock => blocks.partners.get(&pc).map_or(pc + 1, |end| end + 1),
                Flow::JumpBack => match blocks.partners.get(&pc) {
                    Some(&opener) if slots.get(opener).is_some_and(|s| !s.failed()) => opener,
                    _ => pc + 1,
                },
                Flow::Exit => {
                    exited = true;
                    break;
                }
            };
        }

        let commands: Vec<CommandReport> = script
            .lines
            .iter()
            .zip(&slots)
            .map(|(line, slot)| slot.report(line))
            .collect();
        let severity = commands
            .iter()
            .map(|c| c.severity)
            .max()
            .unwrap_or_default();
        log::info!("Run finished with {} ({} commands)", severity, commands.len());

        RunReport {
            commands,
            severity,
            exited,
        }
    }

    /// One discover/execute pass over an initialized line.
    fn step(&mut self, line: &ScriptLine, slot: &mut Slot) -> Flow {
        if slot.failed() {
            if slot.is_opener() {
                log::debug!("Line {}: invalid block opener; skipping its block.", line.number);
                return Flow::SkipBlock;
            }
            return Flow::Continue;
        }
        let (Ok(parsed), Some(command)) = (&line.parsed, slot.command.as_mut()) else {
            return Flow::Continue;
        };
        log::debug!("Line {}: {}", line.number, parsed.name);

        let discovery = {
            let mut ctx = CommandContext::new(
                &mut self.session,
                &mut slot.status,
                parsed,
                Phase::Discovery,
                line.number,
            );
            if let Err(fault) = command.discover(&mut ctx) {
                record_fault(&mut ctx, &fault);
            }
            ctx.worst_recorded()
        };
        if discovery == Severity::Failure {
            log::debug!("Line {}: discovery failed; skipping run.", line.number);
            return Flow::Continue;
        }

        let mut ctx = CommandContext::new(
            &mut self.session,
            &mut slot.status,
            parsed,
            Phase::Run,
            line.number,
        );
        let flow = match command.execute(&mut ctx) {
            Ok(()) => ctx.flow(),
            Err(fault) => {
                record_fault(&mut ctx, &fault);
                Flow::Continue
            }
        };
        slot.status.refresh(Phase::Run, Severity::Success);
        flow
    }
}

// MARK: --- UNIT TESTS ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::engine::{GeoEngine, Layer};
    use serde_json::json;
    use tempfile::tempdir;

    fn run(text: &str) -> (RunReport, Processor) {
        let mut processor = Processor::new(Session::new());
        let report = processor.run_text(text);
        (report, processor)
    }

    #[derive(Debug)]
    struct FaultyEngine;

    impl GeoEngine for FaultyEngine {
        fn read_layer(&self, _path: &Path) -> Result<Layer, EngineFault> {
            Err(EngineFault::Unsupported("reading".to_string()))
        }
        fn write_layer(&self, _layer: &Layer, _path: &Path) -> Result<(), EngineFault> {
            Err(EngineFault::Unsupported("writing".to_string()))
        }
        fn merge_layers(&self, _layers: &[&Layer]) -> Result<Layer, EngineFault> {
            Err(EngineFault::Io(std::io::Error::other("disk on fire")))
        }
    }

    #[test]
    fn test_failed_validation_does_not_halt_run() {
        // --- Setup & Execute ---
        let (report, processor) = run(
            "Message(Message=\"x\", Bogus=\"1\")\n\
             SetProperty(PropertyName=\"A\", PropertyValue=\"1\")\n",
        );

        // --- Assert ---
        assert_eq!(report.severity, Severity::Failure);
        assert_eq!(report.commands.len(), 2);
        assert_eq!(report.commands[0].severity, Severity::Failure);
        assert_eq!(report.commands[1].severity, Severity::Success);
        assert_eq!(processor.session().get_property("A"), Some("1"));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_unknown_command_and_syntax_error_are_line_failures() {
        let (report, processor) = run(
            "Buffer(ID=\"x\")\n\
             SetProperty(PropertyName=\"A\"\n\
             setproperty(PropertyName=\"B\", PropertyValue=\"2\")\n",
        );

        assert_eq!(report.commands.len(), 3);
        assert_eq!(report.commands[0].name, "Buffer");
        assert!(report.commands[0].records[0].1.message.contains("Unrecognized command"));
        assert_eq!(report.commands[1].name, "SetProperty");
        assert!(report.commands[1].records[0].1.message.starts_with("Syntax error"));
        assert_eq!(report.commands[2].severity, Severity::Success);
        assert_eq!(processor.session().get_property("B"), Some("2"));
    }

    #[test]
    fn test_comments_do_not_appear_in_report() {
        let (report, _) = run(
            "# header\n\
             /* block\n\
             Bogus()\n\
             */\n\
             Exit()\n",
        );
        assert_eq!(report.commands.len(), 1);
        assert_eq!(report.commands[0].line, 5);
    }

    #[test]
    fn test_if_false_skips_to_end_if() {
        let (report, processor) = run(
            "SetProperty(PropertyName=\"A\", PropertyValue=\"1\")\n\
             If(Name=\"check\", Condition=\"${A} > 5\")\n\
             SetProperty(PropertyName=\"B\", PropertyValue=\"inside\")\n\
             EndIf(Name=\"check\")\n\
             SetProperty(PropertyName=\"C\", PropertyValue=\"after\")\n",
        );

        let session = processor.session();
        assert!(session.get_property("B").is_none());
        assert_eq!(session.get_property("C"), Some("after"));
        // Skipped commands are validated but never run.
        let skipped = &report.commands[2];
        assert_eq!(skipped.phases[0], (Phase::Initialization, Severity::Success));
        assert_eq!(skipped.phases[2], (Phase::Run, Severity::Unknown));
        assert_eq!(report.severity, Severity::Success);
    }

    #[test]
    fn test_for_loop_runs_body_per_value() {
        let (report, processor) = run(
            "SetProperty(PropertyName=\"Total\", PropertyValue=\"-\")\n\
             For(Name=\"outer\", IteratorProperty=\"N\", SequenceStart=1, SequenceEnd=2)\n\
             For(Name=\"inner\", IteratorProperty=\"L\", ListValues=[a,b])\n\
             SetProperty(PropertyName=\"Total\", PropertyValue=\"${Total}${N}${L}\")\n\
             EndFor(Name=\"inner\")\n\
             EndFor(Name=\"outer\")\n",
        );

        assert_eq!(report.severity, Severity::Success);
        assert_eq!(processor.session().get_property("Total"), Some("-1a1b2a2b"));
    }

    #[test]
    fn test_records_accumulate_across_loop_passes() {
        let (report, _) = run(
            "For(Name=\"l\", ListValues=[1,2,3])\n\
             Message(Message=\"pass ${l}\", CommandStatus=Warning)\n\
             EndFor(Name=\"l\")\n",
        );

        let message = &report.commands[1];
        assert_eq!(message.records.len(), 3);
        assert!(message.records.iter().all(|(phase, _)| *phase == Phase::Run));
        assert_eq!(message.records[2].1.message, "pass 3");
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_unmatched_blocks_fail_initialization() {
        let (report, _) = run(
            "EndIf(Name=\"nothing\")\n\
             For(Name=\"open\", ListValues=[a])\n\
             If(Name=\"x\", Condition=\"1 == 1\")\n\
             EndIf(Name=\"y\")\n",
        );

        assert_eq!(report.commands[0].severity, Severity::Failure);
        assert_eq!(report.commands[1].severity, Severity::Failure);
        assert_eq!(report.commands[2].severity, Severity::Failure);
        assert_eq!(report.commands[3].severity, Severity::Failure);
    }

    #[test]
    fn test_exit_leaves_remaining_commands_unknown() {
        let (report, processor) = run(
            "SetProperty(PropertyName=\"A\", PropertyValue=\"1\")\n\
             Exit()\n\
             SetProperty(PropertyName=\"B\", PropertyValue=\"2\")\n",
        );

        assert!(report.exited);
        assert!(processor.session().get_property("B").is_none());
        assert_eq!(report.commands[2].phases[2], (Phase::Run, Severity::Unknown));
        assert_eq!(report.severity, Severity::Success);
    }

    #[test]
    fn test_invalid_for_skips_its_block() {
        // --- Setup & Execute ---
        let (report, processor) = run(
            "For(Name=\"l\", ListValues=[a], SequenceStart=1)\n\
             SetProperty(PropertyName=\"Body\", PropertyValue=\"ran\")\n\
             EndFor(Name=\"l\")\n\
             SetProperty(PropertyName=\"After\", PropertyValue=\"yes\")\n",
        );

        // --- Assert ---
        assert_eq!(report.commands[0].severity, Severity::Failure);
        assert!(processor.session().get_property("Body").is_none());
        assert_eq!(report.commands[2].phases[2], (Phase::Run, Severity::Unknown));
        assert_eq!(processor.session().get_property("After"), Some("yes"));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_invalid_if_condition_skips_guarded_body() {
        let (report, processor) = run(
            "If(Name=\"g\", Condition=\"no operator here\")\n\
             SetProperty(PropertyName=\"Guarded\", PropertyValue=\"ran\")\n\
             EndIf(Name=\"g\")\n",
        );

        assert_eq!(report.commands[0].severity, Severity::Failure);
        assert!(processor.session().get_property("Guarded").is_none());
    }

    #[test]
    fn test_invalid_end_for_does_not_loop_forever() {
        let (report, processor) = run(
            "For(Name=\"l\", IteratorProperty=\"V\", ListValues=[a,b])\n\
             SetProperty(PropertyName=\"Seen\", PropertyValue=\"${V}\")\n\
             EndFor(Name=\"l\", Bogus=\"1\")\n",
        );

        assert_eq!(report.commands[2].severity, Severity::Failure);
        assert_eq!(processor.session().get_property("Seen"), Some("a"));
    }

    #[test]
    fn test_problems_inside_skipped_block_are_reported() {
        let (report, _) = run(
            "If(Name=\"g\", Condition=\"1 == 2\")\n\
             ReadLayer(Path=\"a.geojson\"\n\
             NoSuchCommand(X=1)\n\
             EndIf(Name=\"g\")\n",
        );

        let syntax = &report.commands[1];
        assert_eq!(syntax.severity, Severity::Failure);
        assert!(syntax.records[0].1.message.starts_with("Syntax error"));
        let unknown = &report.commands[2];
        assert_eq!(unknown.severity, Severity::Failure);
        assert!(unknown.records[0].1.message.contains("Unrecognized command"));
        assert_eq!(report.severity, Severity::Failure);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_problems_after_exit_are_reported() {
        let (report, _) = run("Exit()\nBuffer(ID=\"x\")\n");

        assert!(report.exited);
        assert_eq!(report.commands[1].phases[0], (Phase::Initialization, Severity::Failure));
        assert_eq!(report.commands[1].phases[2], (Phase::Run, Severity::Unknown));
    }

    #[test]
    fn test_engine_fault_becomes_failure_record() {
        let mut session = Session::with_engine(Box::new(FaultyEngine));
        session.layers.put("a", Layer::new(json!({"type": "FeatureCollection", "features": []})));
        let mut processor = Processor::new(session);

        let report = processor.run_text(
            "MergeLayers(IDs=[a], OutputID=\"b\")\n\
             SetProperty(PropertyName=\"After\", PropertyValue=\"yes\")\n",
        );

        let merge = &report.commands[0];
        assert_eq!(merge.severity, Severity::Failure);
        let (phase, record) = &merge.records[0];
        assert_eq!(*phase, Phase::Run);
        assert!(record.message.contains("disk on fire"));
        assert_eq!(record.recommendation, SEE_LOG_RECOMMENDATION);
        assert_eq!(processor.session().get_property("After"), Some("yes"));
    }

    #[test]
    fn test_unresolved_property_is_a_run_warning() {
        let (report, _) = run("Message(Message=\"${Nope}\")\n");
        assert_eq!(report.severity, Severity::Warning);
        let phases: Vec<Phase> = report.commands[0].records.iter().map(|(p, _)| *p).collect();
        assert!(phases.iter().all(|p| *p == Phase::Run));
    }

    #[test]
    fn test_run_file_resolves_paths_against_script_dir() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("in.geojson"),
            r#"{"type": "FeatureCollection", "features": []}"#,
        )
        .unwrap();
        let script_path = dir.path().join("convert.gp");
        fs::write(
            &script_path,
            "ReadLayer(Path=\"in.geojson\")\nWriteLayer(ID=\"in\", Path=\"out/result.geojson\")\n",
        )
        .unwrap();

        // --- Execute ---
        let mut processor = Processor::new(Session::new());
        let report = processor.run_file(&script_path).unwrap();

        // --- Assert ---
        assert_eq!(report.severity, Severity::Success);
        assert!(dir.path().join("out/result.geojson").is_file());
        assert!(processor.session().get_property("CommandFile").is_some());
    }

    #[test]
    fn test_missing_command_file_is_fatal() {
        let dir = tempdir().unwrap();
        let result = read_script(&dir.path().join("nope.gp"));
        assert!(matches!(result, Err(ProcessorError::NotFound(_))));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let (report, _) = run("Message(Message=\"hi\", CommandStatus=Failure)\n");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["severity"], "FAILURE");
        assert_eq!(value["commands"][0]["name"], "Message");
        assert_eq!(value["commands"][0]["phases"][2][0], "RUN");
    }

    #[test]
    fn test_absorb_accumulates_reports() {
        let mut processor = Processor::new(Session::new());
        let mut total = processor.run_text("SetProperty(PropertyName=\"A\", PropertyValue=\"1\")");
        total.absorb(processor.run_text("Message(Message=\"${A}\", CommandStatus=Warning)"));
        assert_eq!(total.commands.len(), 2);
        assert_eq!(total.severity, Severity::Warning);
        assert_eq!(total.count(Severity::Success), 1);
    }
}

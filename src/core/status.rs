// src/core/status.rs

//! # Command Status Model
//!
//! Every command instance owns a `CommandStatus`: a per-phase log of records whose
//! severities roll up into a phase severity, a command severity, and finally a run severity.

use serde::Serialize;
use std::{collections::BTreeMap, fmt, str::FromStr, time::SystemTime};
use thiserror::Error;

/// Outcome level of a record, phase, command, or run.
///
/// The declaration order is the total order: `Unknown < Success < Warning < Failure`.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Nothing has been recorded yet.
    #[default]
    Unknown,
    /// The phase completed without findings.
    Success,
    /// The phase completed but something deserves attention.
    Warning,
    /// The phase failed.
    Failure,
}

impl Severity {
    /// The process exit code a run with this severity maps to.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Unknown | Self::Success => 0,
            Self::Failure => 1,
            Self::Warning => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "UNKNOWN",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a severity (expected Unknown, Success, Warning or Failure).")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Self::Unknown),
            "SUCCESS" => Ok(Self::Success),
            "WARNING" => Ok(Self::Warning),
            "FAILURE" => Ok(Self::Failure),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// The ordered stages a command passes through.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Parameter validation, performed once per command instance.
    Initialization,
    /// Optional probing of prior state (e.g. referenced layers) before running.
    Discovery,
    /// The command's actual work.
    Run,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Initialization, Self::Discovery, Self::Run];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialization => "INITIALIZATION",
            Self::Discovery => "DISCOVERY",
            Self::Run => "RUN",
        };
        f.write_str(label)
    }
}

/// A single timestamped finding.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
    pub timestamp: SystemTime,
}

/// Per-phase log of a single command instance.
#[derive(Serialize, Debug, Clone, Default)]
pub struct CommandStatus {
    records: BTreeMap<Phase, Vec<LogRecord>>,
    /// Explicit "completed without findings" floors installed by `refresh`.
    baselines: BTreeMap<Phase, Severity>,
}

impl CommandStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the phase's log. Prior records are never removed.
    pub fn add_record(
        &mut self,
        phase: Phase,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.records.entry(phase).or_default().push(LogRecord {
            severity,
            message: message.into(),
            recommendation: recommendation.into(),
            timestamp: SystemTime::now(),
        });
    }

    /// The records logged for a phase, oldest first.
    pub fn records(&self, phase: Phase) -> &[LogRecord] {
        self.records.get(&phase).map_or(&[], Vec::as_slice)
    }

    /// All records in phase order, then insertion order.
    pub fn all_records(&self) -> impl Iterator<Item = (Phase, &LogRecord)> {
        self.records
            .iter()
            .flat_map(|(phase, records)| records.iter().map(move |r| (*phase, r)))
    }

    fn max_recorded(&self, phase: Phase) -> Severity {
        self.records(phase)
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or_default()
    }

    /// Max over the phase's records and its baseline; `Unknown` when neither exists.
    pub fn phase_severity(&self, phase: Phase) -> Severity {
        let baseline = self.baselines.get(&phase).copied().unwrap_or_default();
        self.max_recorded(phase).max(baseline)
    }

    /// Max over all phases.
    pub fn overall_severity(&self) -> Severity {
        Phase::ALL
            .iter()
            .map(|p| self.phase_severity(*p))
            .max()
            .unwrap_or_default()
    }

    /// Marks a phase complete: if no record in `phase` exceeds `floor`, installs
    /// `max(floor, Success)` as the phase baseline.
    pub fn refresh(&mut self, phase: Phase, floor: Severity) {
        if self.max_recorded(phase) <= floor {
            self.baselines.insert(phase, floor.max(Severity::Success));
        }
    }

    /// Whether the phase has reached `Failure`.
    pub fn failed(&self, phase: Phase) -> bool {
        self.phase_severity(phase) == Severity::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        assert!(Severity::Unknown < Severity::Success);
        assert!(Severity::Success < Severity::Warning);
        assert!(Severity::Warning < Severity::Failure);
        for a in [Severity::Unknown, Severity::Success, Severity::Warning, Severity::Failure] {
            for b in [Severity::Unknown, Severity::Success, Severity::Warning, Severity::Failure] {
                assert_eq!(a.max(b), b.max(a));
            }
        }
    }

    #[test]
    fn test_empty_status_is_unknown() {
        let status = CommandStatus::new();
        for phase in Phase::ALL {
            assert_eq!(status.phase_severity(phase), Severity::Unknown);
        }
        assert_eq!(status.overall_severity(), Severity::Unknown);
    }

    #[test]
    fn test_phase_severity_is_max_of_records() {
        let mut status = CommandStatus::new();
        status.add_record(Phase::Run, Severity::Warning, "first", "");
        status.add_record(Phase::Run, Severity::Success, "second", "");
        assert_eq!(status.phase_severity(Phase::Run), Severity::Warning);
        assert_eq!(status.records(Phase::Run).len(), 2);

        status.add_record(Phase::Run, Severity::Failure, "third", "Fix it.");
        assert_eq!(status.phase_severity(Phase::Run), Severity::Failure);
        assert_eq!(status.overall_severity(), Severity::Failure);
        assert_eq!(status.phase_severity(Phase::Initialization), Severity::Unknown);
    }

    #[test]
    fn test_phase_severity_never_decreases() {
        let mut status = CommandStatus::new();
        let mut previous = status.phase_severity(Phase::Discovery);
        let sequence = [
            Severity::Warning,
            Severity::Success,
            Severity::Failure,
            Severity::Unknown,
        ];
        for severity in sequence {
            status.add_record(Phase::Discovery, severity, "m", "r");
            let current = status.phase_severity(Phase::Discovery);
            assert!(current >= previous);
            assert!(current >= severity);
            previous = current;
        }
    }

    #[test]
    fn test_refresh_installs_success_baseline() {
        let mut status = CommandStatus::new();
        status.refresh(Phase::Initialization, Severity::Success);
        assert_eq!(status.phase_severity(Phase::Initialization), Severity::Success);

        // A floor below Success still yields Success.
        status.refresh(Phase::Run, Severity::Unknown);
        assert_eq!(status.phase_severity(Phase::Run), Severity::Success);
    }

    #[test]
    fn test_refresh_does_not_mask_findings() {
        let mut status = CommandStatus::new();
        status.add_record(Phase::Run, Severity::Failure, "boom", "See the log file for details.");
        status.refresh(Phase::Run, Severity::Success);
        assert_eq!(status.phase_severity(Phase::Run), Severity::Failure);

        let mut warned = CommandStatus::new();
        warned.add_record(Phase::Run, Severity::Warning, "careful", "");
        warned.refresh(Phase::Run, Severity::Warning);
        assert_eq!(warned.phase_severity(Phase::Run), Severity::Warning);
    }

    #[test]
    fn test_all_records_in_phase_order() {
        let mut status = CommandStatus::new();
        status.add_record(Phase::Run, Severity::Warning, "run", "");
        status.add_record(Phase::Initialization, Severity::Success, "init", "");
        let phases: Vec<Phase> = status.all_records().map(|(p, _)| p).collect();
        assert_eq!(phases, vec![Phase::Initialization, Phase::Run]);
    }

    #[test]
    fn test_severity_from_str_and_exit_code() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(" Failure ".parse::<Severity>().unwrap(), Severity::Failure);
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!(Severity::Unknown.exit_code(), 0);
        assert_eq!(Severity::Success.exit_code(), 0);
        assert_eq!(Severity::Failure.exit_code(), 1);
        assert_eq!(Severity::Warning.exit_code(), 2);
    }
}

//! Per-cycle decision report.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{behavior::Posting, error::HelmError};

/// Why a cycle produced no decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    /// Mandatory axes received no value.
    MissingAxes {
        /// Axes left undecided, in domain order.
        axes: Vec<String>,
    },
    /// A behavior reported unusable critical input or setup.
    BehaviorFatal {
        /// Behavior name.
        behavior: String,
        /// Reported cause.
        reason: String,
    },
    /// The votes could not be combined.
    Coupling {
        /// Underlying failure.
        reason: String,
    },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAxes { axes } => write!(f, "missing mandatory axes: {}", axes.join(",")),
            Self::BehaviorFatal { behavior, reason } => {
                write!(f, "behavior `{behavior}` failed: {reason}")
            }
            Self::Coupling { reason } => write!(f, "coupling failed: {reason}"),
        }
    }
}

impl From<&HaltReason> for HelmError {
    fn from(reason: &HaltReason) -> Self {
        Self::Arbitration(reason.to_string())
    }
}

/// Outcome of one arbitration cycle. When `halted`, `decisions` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReport {
    /// Unique id of the cycle.
    pub cycle_id: Uuid,
    /// Monotonic cycle counter, starting at one.
    pub iteration: u64,
    /// Helm time the cycle ran at.
    pub time: f64,
    /// Decided value per axis, in decision domain order.
    pub decisions: IndexMap<String, f64>,
    /// Every mandatory axis received a value.
    pub complete: bool,
    /// No decision was published this cycle.
    pub halted: bool,
    /// Cause of the halt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<HaltReason>,
    /// Functions that took part in coupling.
    pub function_count: usize,
    /// Behaviors running at the end of the cycle.
    pub running: Vec<String>,
    /// Behaviors idle at the end of the cycle.
    pub idle: Vec<String>,
    /// Behaviors completed at the end of the cycle.
    pub completed: Vec<String>,
    /// Abstentions, `behavior: reason`.
    pub warnings: Vec<String>,
    /// State writes requested during the cycle.
    pub postings: Vec<Posting>,
    /// Mode set result, `VAR,VALUE:VAR,VALUE`.
    pub mode_summary: String,
    /// Milliseconds spent on modes and behaviors.
    pub create_time_ms: f64,
    /// Milliseconds spent coupling and resolving.
    pub solve_time_ms: f64,
    /// Wall clock time of the report.
    pub timestamp: DateTime<Utc>,
}

impl DecisionReport {
    pub(crate) fn new(iteration: u64, time: f64) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            iteration,
            time,
            decisions: IndexMap::new(),
            complete: false,
            halted: false,
            halt_reason: None,
            function_count: 0,
            running: Vec::new(),
            idle: Vec::new(),
            completed: Vec::new(),
            warnings: Vec::new(),
            postings: Vec::new(),
            mode_summary: String::new(),
            create_time_ms: 0.0,
            solve_time_ms: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Decided value of an axis.
    #[must_use]
    pub fn decision(&self, axis: &str) -> Option<f64> {
        self.decisions.get(axis).copied()
    }

    /// The halt as an arbitration error, if the cycle halted.
    #[must_use]
    pub fn error(&self) -> Option<HelmError> {
        self.halt_reason.as_ref().map(HelmError::from)
    }

    /// One-line summary for consoles and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let outcome = match &self.halt_reason {
            Some(reason) => format!("halted ({reason})"),
            None => self
                .decisions
                .iter()
                .map(|(axis, value)| format!("{axis}={value}"))
                .collect::<Vec<_>>()
                .join(","),
        };
        format!(
            "#{} {} functions={} running={} warnings={}",
            self.iteration,
            outcome,
            self.function_count,
            self.running.len(),
            self.warnings.len()
        )
    }
}

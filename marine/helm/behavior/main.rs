//! Behaviors: policy units that cast one weighted vote per cycle, gated by
//! run conditions and a small lifecycle.

/// Contact avoidance.
pub mod avoid;
/// Fixed heading or speed preferences.
pub mod constant;
/// Compass geometry helpers.
pub mod geometry;
/// Station keeping.
pub mod hold;
/// Alternating-heading sentry.
pub mod sentry;
/// Behavior set and constructor registry.
pub mod set;
/// Vote-free timer.
pub mod timer;
/// Waypoint following.
pub mod waypoint;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use set::{BehaviorFactory, BehaviorSet};

use crate::{
    domain::DecisionDomain,
    error::HelmError,
    function::{coupler::Coupler, peak::PeakFunction, IvpFunction, PartitionMap},
    logic::{all_hold, LogicCondition},
    state::{StateStore, StateValue},
};

/// Where a behavior is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Accepting parameters.
    Configuring,
    /// Waiting for its run conditions.
    Idle,
    /// Voting every cycle.
    Running,
    /// Finished; never runs again.
    Completed,
}

/// What a running behavior produced this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorOutcome {
    /// A weighted preference function.
    Vote(IvpFunction),
    /// Nothing to say this cycle.
    Pass,
    /// No vote because an input is missing; reported as a warning.
    Abstain(String),
    /// Critical input or setup is unusable; halts the cycle.
    Fatal(String),
}

/// A `VAR=VALUE` write requested by a behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Variable to write.
    pub var: String,
    /// Value to write.
    pub value: StateValue,
}

impl Posting {
    /// Creates a posting.
    #[must_use]
    pub fn new(var: impl Into<String>, value: impl Into<StateValue>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
        }
    }

    /// Parses `VAR=VALUE`; numeric values become numbers.
    pub fn parse(text: &str) -> Result<Self, HelmError> {
        let (var, value) = text
            .split_once('=')
            .map(|(var, value)| (var.trim(), value.trim()))
            .filter(|(var, value)| !var.is_empty() && !value.is_empty())
            .ok_or_else(|| HelmError::invalid("flag", text))?;
        let value = value
            .parse::<f64>()
            .map_or_else(|_| StateValue::Text(value.to_string()), StateValue::Number);
        Ok(Self::new(var, value))
    }
}

/// Read-only view handed to behaviors while they run.
pub struct CycleContext<'a> {
    /// State snapshot for this cycle.
    pub store: &'a dyn StateStore,
    /// Full decision domain.
    pub domain: &'a DecisionDomain,
    /// Cycle time in seconds.
    pub time: f64,
    /// Cycle counter.
    pub iteration: u64,
}

impl fmt::Debug for CycleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleContext")
            .field("time", &self.time)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

impl CycleContext<'_> {
    /// Numeric input, or `MissingInput`.
    pub fn require_number(&self, name: &str) -> Result<f64, HelmError> {
        self.store
            .number(name)
            .ok_or_else(|| HelmError::MissingInput(name.to_string()))
    }

    /// Own-ship position from `NAV_X` and `NAV_Y`.
    pub fn own_position(&self) -> Result<(f64, f64), HelmError> {
        Ok((self.require_number("NAV_X")?, self.require_number("NAV_Y")?))
    }
}

/// State and parameters shared by every behavior kind.
#[derive(Debug, Clone)]
pub struct BehaviorCore {
    kind: String,
    name: String,
    priority: f64,
    conditions: Vec<LogicCondition>,
    perpetual: bool,
    duration: Option<f64>,
    run_flags: Vec<Posting>,
    idle_flags: Vec<Posting>,
    end_flags: Vec<Posting>,
    state: LifecycleState,
    running_since: Option<f64>,
    running_total: f64,
    completion_requested: bool,
    pending: Vec<Posting>,
}

impl BehaviorCore {
    /// Core for a behavior kind, named after the kind, priority 100.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            name: kind.clone(),
            kind,
            priority: 100.0,
            conditions: Vec::new(),
            perpetual: false,
            duration: None,
            run_flags: Vec::new(),
            idle_flags: Vec::new(),
            end_flags: Vec::new(),
            state: LifecycleState::Configuring,
            running_since: None,
            running_total: 0.0,
            completion_requested: false,
            pending: Vec::new(),
        }
    }

    /// Registered kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority weight applied to every vote.
    #[must_use]
    pub const fn priority(&self) -> f64 {
        self.priority
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether completion restarts the behavior.
    #[must_use]
    pub const fn perpetual(&self) -> bool {
        self.perpetual
    }

    /// Running time after which the behavior completes.
    #[must_use]
    pub const fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Seconds spent running, up to `now`.
    #[must_use]
    pub fn elapsed(&self, now: f64) -> f64 {
        self.running_total + self.running_since.map_or(0.0, |since| (now - since).max(0.0))
    }

    /// Variables referenced by the run conditions.
    #[must_use]
    pub fn condition_vars(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for condition in &self.conditions {
            for name in condition.var_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Applies a common parameter. `Ok(false)` means the key is not common.
    /// Values are validated before anything changes.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<bool, HelmError> {
        match key {
            "name" => {
                if value.is_empty() || value.contains(char::is_whitespace) {
                    return Err(HelmError::invalid(key, value));
                }
                self.name = value.to_string();
            }
            "priority" | "pwt" => {
                let priority = parse_number(key, value)?;
                if priority < 0.0 {
                    return Err(HelmError::invalid(key, value));
                }
                self.priority = priority;
            }
            "condition" => self.conditions.push(LogicCondition::parse(value)?),
            "perpetual" => self.perpetual = parse_bool(key, value)?,
            "duration" => {
                let duration = parse_number(key, value)?;
                if duration <= 0.0 {
                    return Err(HelmError::invalid(key, value));
                }
                self.duration = Some(duration);
            }
            "runflag" => self.run_flags.push(Posting::parse(value)?),
            "idleflag" => self.idle_flags.push(Posting::parse(value)?),
            "endflag" => self.end_flags.push(Posting::parse(value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Asks for the behavior to complete after this cycle.
    pub fn request_completion(&mut self) {
        self.completion_requested = true;
    }

    /// Queues a state write, applied after the cycle.
    pub fn post(&mut self, var: impl Into<String>, value: impl Into<StateValue>) {
        self.pending.push(Posting::new(var, value));
    }

    pub(crate) fn take_postings(&mut self) -> Vec<Posting> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn finish_configuration(&mut self) {
        if self.state == LifecycleState::Configuring {
            self.state = LifecycleState::Idle;
            self.pending.extend(self.idle_flags.iter().cloned());
        }
    }

    fn enter(&mut self, state: LifecycleState, now: f64) {
        if let Some(since) = self.running_since.take() {
            self.running_total += (now - since).max(0.0);
        }
        let flags = match state {
            LifecycleState::Running => {
                self.running_since = Some(now);
                &self.run_flags
            }
            LifecycleState::Idle => &self.idle_flags,
            LifecycleState::Completed => &self.end_flags,
            LifecycleState::Configuring => return,
        };
        self.pending.extend(flags.iter().cloned());
        self.state = state;
    }

    /// Rebinds run conditions and moves between idle and running; a running
    /// behavior past its duration completes.
    pub(crate) fn update(&mut self, store: &dyn StateStore, now: f64) -> bool {
        if matches!(
            self.state,
            LifecycleState::Configuring | LifecycleState::Completed
        ) {
            return false;
        }
        for condition in &mut self.conditions {
            condition.bind_from(store);
        }
        if all_hold(&self.conditions) {
            if self.state == LifecycleState::Idle {
                self.enter(LifecycleState::Running, now);
            }
            if self.duration.is_some_and(|limit| self.elapsed(now) >= limit) {
                return self.complete(now);
            }
        } else if self.state == LifecycleState::Running {
            self.enter(LifecycleState::Idle, now);
        }
        false
    }

    /// Completes if requested this cycle; see [`Self::complete`].
    pub(crate) fn settle(&mut self, now: f64) -> bool {
        if std::mem::take(&mut self.completion_requested) {
            return self.complete(now);
        }
        false
    }

    // Posts end flags. A perpetual behavior restarts its clock and keeps
    // running; returns true when the behavior should reset its own state.
    fn complete(&mut self, now: f64) -> bool {
        self.completion_requested = false;
        if self.perpetual {
            self.pending.extend(self.end_flags.iter().cloned());
            self.running_total = 0.0;
            self.running_since = Some(now);
            return true;
        }
        self.enter(LifecycleState::Completed, now);
        false
    }
}

/// A policy unit. Implementors own a [`BehaviorCore`] and add their own
/// parameters and vote.
pub trait Behavior: Send + fmt::Debug {
    /// Shared state.
    fn core(&self) -> &BehaviorCore;

    /// Shared state, mutable.
    fn core_mut(&mut self) -> &mut BehaviorCore;

    /// Applies a kind-specific parameter.
    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError>;

    /// Checks that required parameters were supplied.
    fn validate(&self) -> Result<(), HelmError> {
        Ok(())
    }

    /// Input variables read while running.
    fn info_vars(&self) -> Vec<String> {
        Vec::new()
    }

    /// Produces this cycle's outcome.
    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome;

    /// Called each cycle the behavior is idle.
    fn on_idle_state(&mut self, _ctx: &CycleContext<'_>) {}

    /// Called when a perpetual behavior completes and starts over.
    fn on_reset(&mut self) {}
}

/// Applies one parameter to a behavior: common keys first, then the kind's
/// own. Keys are matched lowercased.
pub fn apply_param(behavior: &mut dyn Behavior, key: &str, value: &str) -> Result<(), HelmError> {
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();
    if behavior.core().state() != LifecycleState::Configuring {
        return Err(HelmError::Block(format!(
            "behavior `{}` is no longer configurable",
            behavior.core().name()
        )));
    }
    if behavior.core_mut().set_param(&key, value)? {
        return Ok(());
    }
    behavior.set_param(&key, value)
}

pub(crate) fn unknown_param(behavior: &str, key: &str) -> HelmError {
    HelmError::UnknownParam {
        owner: behavior.to_string(),
        param: key.to_string(),
    }
}

pub(crate) fn parse_number(key: &str, value: &str) -> Result<f64, HelmError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| HelmError::invalid(key, value))
}

pub(crate) fn parse_non_negative(key: &str, value: &str) -> Result<f64, HelmError> {
    let number = parse_number(key, value)?;
    if number < 0.0 {
        return Err(HelmError::invalid(key, value));
    }
    Ok(number)
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, HelmError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(HelmError::invalid(key, value)),
    }
}

/// Course peak toward `heading` coupled with a speed peak at `speed`. The
/// domain must carry `course` and `speed` axes.
pub(crate) fn course_speed_map(
    domain: &DecisionDomain,
    heading: f64,
    course_width: f64,
    speed: f64,
    speed_width: f64,
) -> Result<PartitionMap, HelmError> {
    let course = course_map(domain, heading, course_width)?;
    let speed = speed_map(domain, speed, speed_width)?;
    let joint = Coupler::new().couple(
        &IvpFunction::new(course, 1.0),
        &IvpFunction::new(speed, 1.0),
    )?;
    Ok(joint.map().clone())
}

/// Wrapped course peak.
pub(crate) fn course_map(
    domain: &DecisionDomain,
    heading: f64,
    base_width: f64,
) -> Result<PartitionMap, HelmError> {
    PeakFunction::new(domain, "course")?
        .summit(geometry::angle360(heading))
        .base_width(base_width)
        .wrap(true)
        .extract()
}

/// Speed peak.
pub(crate) fn speed_map(
    domain: &DecisionDomain,
    speed: f64,
    base_width: f64,
) -> Result<PartitionMap, HelmError> {
    PeakFunction::new(domain, "speed")?
        .summit(speed)
        .base_width(base_width)
        .extract()
}

/// Wraps a map as a vote at the behavior's priority.
pub(crate) fn vote(core: &BehaviorCore, map: Result<PartitionMap, HelmError>) -> BehaviorOutcome {
    match map {
        Ok(map) => BehaviorOutcome::Vote(
            IvpFunction::new(map, core.priority()).with_descriptor(core.name()),
        ),
        Err(err) => BehaviorOutcome::Fatal(err.to_string()),
    }
}

use indexmap::IndexMap;
use tracing::debug;

use super::{
    apply_param, avoid::AvoidContact, constant::ConstantHeading, constant::ConstantSpeed,
    hold::HoldPosition, sentry::TimedSentry, timer::Timer, waypoint::Waypoint, Behavior,
    BehaviorOutcome, CycleContext, LifecycleState, Posting,
};
use crate::{config::parse_assignments, error::HelmError};

/// Creates an unconfigured behavior.
pub type Constructor = fn() -> Box<dyn Behavior>;

fn construct<B: Behavior + Default + 'static>() -> Box<dyn Behavior> {
    Box::<B>::default()
}

/// Table of behavior constructors keyed by kind.
#[derive(Debug, Clone)]
pub struct BehaviorFactory {
    constructors: IndexMap<String, Constructor>,
}

impl Default for BehaviorFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("waypoint", construct::<Waypoint>);
        factory.register("hold_position", construct::<HoldPosition>);
        factory.register("avoid_contact", construct::<AvoidContact>);
        factory.register("timed_sentry", construct::<TimedSentry>);
        factory.register("timer", construct::<Timer>);
        factory.register("constant_heading", construct::<ConstantHeading>);
        factory.register("constant_speed", construct::<ConstantSpeed>);
        factory
    }
}

impl BehaviorFactory {
    /// Factory with no kinds registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Registers a kind, replacing any previous constructor for it.
    pub fn register(&mut self, kind: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    /// Registered kinds in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Unconfigured behavior of the given kind.
    pub fn create(&self, kind: &str) -> Result<Box<dyn Behavior>, HelmError> {
        self.constructors
            .get(kind.trim())
            .map(|constructor| constructor())
            .ok_or_else(|| HelmError::UnknownBehavior(kind.trim().to_string()))
    }

    /// Creates a behavior and applies its `key = value` parameter text.
    /// The first rejected parameter aborts the build.
    pub fn build(&self, kind: &str, params: &str) -> Result<Box<dyn Behavior>, HelmError> {
        let mut behavior = self.create(kind)?;
        for (key, value) in parse_assignments(params)? {
            apply_param(behavior.as_mut(), &key, &value)?;
        }
        Ok(behavior)
    }
}

/// Configured behaviors in declaration order.
#[derive(Debug, Default)]
pub struct BehaviorSet {
    behaviors: Vec<Box<dyn Behavior>>,
}

impl BehaviorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configured behavior and moves it to idle. Names must be
    /// unique within the set.
    pub fn add(&mut self, mut behavior: Box<dyn Behavior>) -> Result<(), HelmError> {
        let name = behavior.core().name().to_string();
        if self.get(&name).is_some() {
            return Err(HelmError::Block(format!("duplicate behavior name `{name}`")));
        }
        behavior.validate()?;
        behavior.core_mut().finish_configuration();
        self.behaviors.push(behavior);
        Ok(())
    }

    /// Number of behaviors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Behavior names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.behaviors
            .iter()
            .map(|behavior| behavior.core().name())
            .collect()
    }

    /// Behavior by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Behavior> {
        self.behaviors
            .iter()
            .find(|behavior| behavior.core().name() == name)
            .map(Box::as_ref)
    }

    /// Every variable the set reads: run conditions plus behavior inputs.
    #[must_use]
    pub fn info_vars(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for behavior in &self.behaviors {
            for var in behavior
                .core()
                .condition_vars()
                .into_iter()
                .chain(behavior.info_vars())
            {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }

    /// Advances every lifecycle against the cycle snapshot, then runs the
    /// behaviors that are running. Outcomes are returned in declaration
    /// order, one per running behavior.
    pub fn run_cycle(&mut self, ctx: &CycleContext<'_>) -> Vec<(String, BehaviorOutcome)> {
        let mut outcomes = Vec::new();
        for behavior in &mut self.behaviors {
            if behavior.core_mut().update(ctx.store, ctx.time) {
                behavior.on_reset();
            }
            match behavior.core().state() {
                LifecycleState::Running => {
                    let outcome = behavior.on_run_state(ctx);
                    if behavior.core_mut().settle(ctx.time) {
                        behavior.on_reset();
                    }
                    outcomes.push((behavior.core().name().to_string(), outcome));
                }
                LifecycleState::Idle => behavior.on_idle_state(ctx),
                LifecycleState::Configuring | LifecycleState::Completed => {}
            }
        }
        debug!(
            iteration = ctx.iteration,
            running = outcomes.len(),
            "behavior set cycled"
        );
        outcomes
    }

    /// Names of behaviors currently in `state`.
    #[must_use]
    pub fn names_in(&self, state: LifecycleState) -> Vec<String> {
        self.behaviors
            .iter()
            .filter(|behavior| behavior.core().state() == state)
            .map(|behavior| behavior.core().name().to_string())
            .collect()
    }

    /// Drains the postings queued by every behavior, in declaration order.
    pub fn take_postings(&mut self) -> Vec<Posting> {
        self.behaviors
            .iter_mut()
            .flat_map(|behavior| behavior.core_mut().take_postings())
            .collect()
    }
}

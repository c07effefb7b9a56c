//! Arbitration: runs modes and behaviors against one state snapshot,
//! couples the votes and resolves a single decision per cycle.

/// Decision reports and halt causes.
pub mod report;

use std::time::Instant;

use indexmap::IndexMap;
use serde_json::json;
use shared_logging::LogLevel;
use tracing::{debug, error, info, instrument, warn};

pub use report::{DecisionReport, HaltReason};

use crate::{
    behavior::{BehaviorOutcome, BehaviorSet, CycleContext, LifecycleState},
    domain::DecisionDomain,
    function::{coupler::Coupler, IvpFunction},
    modes::ModeSet,
    state::StateStore,
    telemetry::HelmTelemetry,
};

/// Owns the decision domain and mode set and produces one
/// [`DecisionReport`] per call.
#[derive(Debug)]
pub struct HelmEngine {
    domain: DecisionDomain,
    modes: ModeSet,
    coupler: Coupler,
    telemetry: Option<HelmTelemetry>,
    iteration: u64,
}

impl HelmEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(domain: DecisionDomain, modes: ModeSet) -> Self {
        Self {
            domain,
            modes,
            coupler: Coupler::new(),
            telemetry: None,
            iteration: 0,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: HelmTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Decision domain.
    #[must_use]
    pub const fn domain(&self) -> &DecisionDomain {
        &self.domain
    }

    /// Mode set.
    #[must_use]
    pub const fn modes(&self) -> &ModeSet {
        &self.modes
    }

    /// Cycles run so far.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Runs one cycle. Modes write their results to `store` first; every
    /// behavior then reads the same snapshot. Postings are returned in the
    /// report, not applied. A halted cycle publishes no values.
    #[instrument(skip_all, fields(iteration = self.iteration + 1))]
    pub fn determine_next_decision(
        &mut self,
        behaviors: &mut BehaviorSet,
        store: &mut dyn StateStore,
    ) -> DecisionReport {
        self.iteration += 1;
        let iteration = self.iteration;
        let time = store.current_time();
        let mut report = DecisionReport::new(iteration, time);
        let started = Instant::now();

        self.modes.evaluate(store);
        report.mode_summary = self.modes.summary();

        let outcomes = {
            let ctx = CycleContext {
                store: &*store,
                domain: &self.domain,
                time,
                iteration,
            };
            behaviors.run_cycle(&ctx)
        };

        let mut functions: Vec<IvpFunction> = Vec::new();
        let mut fatal: Option<HaltReason> = None;
        for (name, outcome) in outcomes {
            match outcome {
                BehaviorOutcome::Vote(function) => functions.push(function),
                BehaviorOutcome::Pass => {}
                BehaviorOutcome::Abstain(reason) => {
                    warn!(behavior = %name, %reason, "behavior abstained");
                    self.log(
                        LogLevel::Warn,
                        "helm.behavior.abstain",
                        json!({ "behavior": name, "reason": reason }),
                    );
                    report.warnings.push(format!("{name}: {reason}"));
                }
                BehaviorOutcome::Fatal(reason) => {
                    error!(behavior = %name, %reason, "behavior failed");
                    self.log(
                        LogLevel::Error,
                        "helm.behavior.fatal",
                        json!({ "behavior": name, "reason": reason }),
                    );
                    fatal.get_or_insert(HaltReason::BehaviorFatal {
                        behavior: name,
                        reason,
                    });
                }
            }
        }
        report.function_count = functions.len();
        report.running = behaviors.names_in(LifecycleState::Running);
        report.idle = behaviors.names_in(LifecycleState::Idle);
        report.completed = behaviors.names_in(LifecycleState::Completed);
        report.postings = behaviors.take_postings();
        report.create_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let solving = Instant::now();
        let resolved = match fatal {
            Some(reason) => Err(reason),
            None => self.resolve(&functions),
        };
        report.solve_time_ms = solving.elapsed().as_secs_f64() * 1000.0;

        match resolved {
            Ok(decisions) => {
                report.decisions = decisions;
                report.complete = true;
                debug!(summary = %report.summary(), "decision complete");
                self.log(
                    LogLevel::Info,
                    "helm.cycle.complete",
                    json!({
                        "decisions": report.decisions,
                        "functions": report.function_count,
                        "solve_ms": report.solve_time_ms,
                    }),
                );
            }
            Err(reason) => {
                info!(%reason, "cycle halted");
                self.log(
                    LogLevel::Warn,
                    "helm.cycle.halted",
                    json!({ "reason": reason.to_string(), "functions": report.function_count }),
                );
                report.halted = true;
                report.halt_reason = Some(reason);
            }
        }

        if let Some(telemetry) = &self.telemetry {
            if let Ok(payload) = serde_json::to_value(&report) {
                let _ = telemetry.event("helm.decision", payload);
            }
        }
        report
    }

    // Couples the votes and reads the optimum back in domain order. Every
    // mandatory axis must end up with a value.
    fn resolve(&self, functions: &[IvpFunction]) -> Result<IndexMap<String, f64>, HaltReason> {
        let joint = self
            .coupler
            .couple_all(functions)
            .map_err(|err| HaltReason::Coupling {
                reason: err.to_string(),
            })?;

        let mut decisions = IndexMap::new();
        if let Some(joint) = joint {
            let optimum = joint.map().argmax().ok_or_else(|| HaltReason::Coupling {
                reason: "joint function has no regions".into(),
            })?;
            let voted = joint.domain();
            for (position, axis) in voted.axes().iter().enumerate() {
                let known = self
                    .domain
                    .index_of(&axis.name)
                    .and_then(|index| self.domain.axis(index))
                    .filter(|known| known.points == axis.points);
                if known.is_none() {
                    return Err(HaltReason::Coupling {
                        reason: format!("axis `{}` does not match the decision domain", axis.name),
                    });
                }
                debug!(axis = %axis.name, index = optimum.point[position], "axis resolved");
            }
            for axis in self.domain.axes() {
                if let Some(position) = voted.index_of(&axis.name) {
                    decisions.insert(axis.name.clone(), axis.value_at(optimum.point[position]));
                }
            }
        }

        let missing: Vec<String> = self
            .domain
            .axes()
            .iter()
            .filter(|axis| axis.mandatory && !decisions.contains_key(&axis.name))
            .map(|axis| axis.name.clone())
            .collect();
        if missing.is_empty() {
            Ok(decisions)
        } else {
            Err(HaltReason::MissingAxes { axes: missing })
        }
    }

    fn log(&self, level: LogLevel, message: &str, fields: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, self.iteration, fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_event_bus::MemoryEventBus;
    use shared_logging::MemorySink;

    use super::*;
    use crate::{
        behavior::{
            apply_param, course_map, parse_number, unknown_param, vote, Behavior, BehaviorCore,
            BehaviorFactory,
        },
        error::HelmError,
        function::{
            region::{Polynomial, Region},
            PartitionMap,
        },
        state::StateBuffer,
    };

    /// Course peak with no speed preference.
    #[derive(Debug)]
    struct PreferCourse {
        core: BehaviorCore,
        heading: f64,
    }

    impl Behavior for PreferCourse {
        fn core(&self) -> &BehaviorCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut BehaviorCore {
            &mut self.core
        }

        fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
            match key {
                "heading" => self.heading = parse_number(key, value)?,
                _ => return Err(unknown_param("prefer_course", key)),
            }
            Ok(())
        }

        fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
            let map = course_map(ctx.domain, self.heading, 90.0).and_then(|course| {
                let flat = PartitionMap::constant(ctx.domain.sub_domain(&["speed"])?, 0.0)?;
                let joint = Coupler::new()
                    .couple(&IvpFunction::new(course, 1.0), &IvpFunction::new(flat, 1.0))?;
                Ok(joint.map().clone())
            });
            vote(&self.core, map)
        }
    }

    /// Two equal halves of the course axis.
    #[derive(Debug)]
    struct SplitCourse {
        core: BehaviorCore,
    }

    impl Behavior for SplitCourse {
        fn core(&self) -> &BehaviorCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut BehaviorCore {
            &mut self.core
        }

        fn set_param(&mut self, key: &str, _value: &str) -> Result<(), HelmError> {
            Err(unknown_param("split_course", key))
        }

        fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
            let map = ctx.domain.sub_domain(&["course"]).and_then(|course| {
                PartitionMap::new(
                    course,
                    vec![
                        Region::from_pairs(&[(0, 179)]).with_poly(Polynomial::constant(5.0, 1)),
                        Region::from_pairs(&[(180, 359)]).with_poly(Polynomial::constant(5.0, 1)),
                    ],
                    0,
                )
            });
            vote(&self.core, map)
        }
    }

    fn prefer(name: &str, heading: &str, pwt: &str) -> Box<dyn Behavior> {
        let mut behavior = PreferCourse {
            core: BehaviorCore::new("prefer_course"),
            heading: 0.0,
        };
        for (key, value) in [("name", name), ("heading", heading), ("pwt", pwt)] {
            apply_param(&mut behavior, key, value).unwrap();
        }
        Box::new(behavior)
    }

    fn domain(entries: &[&str]) -> DecisionDomain {
        DecisionDomain::parse(entries).unwrap()
    }

    #[test]
    fn heavier_vote_wins_and_decision_is_complete() {
        let mut engine = HelmEngine::new(
            domain(&["course:0:359:360", "speed:0:5:50"]),
            ModeSet::new(),
        );
        let mut set = BehaviorSet::new();
        set.add(prefer("a", "90", "50")).unwrap();
        set.add(prefer("b", "180", "100")).unwrap();
        let mut store = StateBuffer::new();

        let report = engine.determine_next_decision(&mut set, &mut store);
        assert!(report.complete);
        assert!(!report.halted);
        assert_eq!(report.function_count, 2);
        assert!((report.decision("course").unwrap() - 180.0).abs() < 1e-9);
        assert!(report.decision("speed").is_some());
        assert_eq!(
            report.decisions.keys().collect::<Vec<_>>(),
            vec!["course", "speed"]
        );
        assert_eq!(report.running, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_mandatory_axis_halts_every_cycle() {
        let mut engine = HelmEngine::new(
            domain(&["course:0:359:360", "speed:0:5:50"]),
            ModeSet::new(),
        );
        let mut set = BehaviorSet::new();
        set.add(
            BehaviorFactory::default()
                .build("constant_heading", "heading = 90")
                .unwrap(),
        )
        .unwrap();
        let mut store = StateBuffer::new();

        for expected in 1..=2 {
            let report = engine.determine_next_decision(&mut set, &mut store);
            assert_eq!(report.iteration, expected);
            assert!(!report.complete);
            assert!(report.halted);
            assert!(report.decisions.is_empty());
            assert_eq!(
                report.halt_reason,
                Some(HaltReason::MissingAxes {
                    axes: vec!["speed".into()]
                })
            );
        }
    }

    #[test]
    fn exact_ties_go_to_the_lowest_region() {
        let mut engine = HelmEngine::new(
            domain(&["course:0:359:360", "speed:0:4:41:optional"]),
            ModeSet::new(),
        );
        let mut set = BehaviorSet::new();
        set.add(Box::new(SplitCourse {
            core: BehaviorCore::new("split_course"),
        }))
        .unwrap();
        let mut store = StateBuffer::new();
        let report = engine.determine_next_decision(&mut set, &mut store);
        assert!(report.complete);
        assert!((report.decision("course").unwrap() - 89.0).abs() < 1e-9);
        assert_eq!(report.decision("speed"), None);
    }

    #[test]
    fn modes_gate_behaviors_within_the_cycle() {
        let mut modes = ModeSet::new();
        modes
            .add_declaration("var = MODE\nvalue = TRANSIT\ncondition = DEPLOY = true")
            .unwrap();
        let mut engine = HelmEngine::new(domain(&["course:0:359:360", "speed:0:4:41"]), modes);
        let factory = BehaviorFactory::default();
        let mut set = BehaviorSet::new();
        set.add(
            factory
                .build("constant_heading", "heading = 90\ncondition = MODE = TRANSIT")
                .unwrap(),
        )
        .unwrap();
        set.add(
            factory
                .build("constant_speed", "speed = 2\ncondition = MODE = TRANSIT")
                .unwrap(),
        )
        .unwrap();
        let mut store = StateBuffer::new();

        let idle = engine.determine_next_decision(&mut set, &mut store);
        assert!(idle.halted);
        assert_eq!(idle.idle.len(), 2);

        store.set("DEPLOY", "true".into());
        let report = engine.determine_next_decision(&mut set, &mut store);
        assert!(report.complete);
        assert_eq!(report.mode_summary, "MODE,TRANSIT");
        assert!((report.decision("course").unwrap() - 90.0).abs() < 1e-9);
        assert!((report.decision("speed").unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(store.text("MODE").as_deref(), Some("TRANSIT"));
    }

    #[test]
    fn fatal_and_abstain_are_reported() {
        let sink = Arc::new(MemorySink::new(32));
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = HelmTelemetry::builder("helm")
            .log_sink(sink.clone())
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let mut engine =
            HelmEngine::new(domain(&["speed:0:4:41"]), ModeSet::new()).with_telemetry(telemetry);
        let factory = BehaviorFactory::default();
        let mut set = BehaviorSet::new();
        set.add(factory.build("waypoint", "points = 0,10").unwrap())
            .unwrap();
        set.add(factory.build("constant_heading", "heading = 90").unwrap())
            .unwrap();
        let mut store = StateBuffer::new();

        let report = engine.determine_next_decision(&mut set, &mut store);
        assert!(report.halted);
        assert!(matches!(
            report.halt_reason,
            Some(HaltReason::BehaviorFatal { ref behavior, .. }) if behavior == "constant_heading"
        ));
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("NAV_X"));
        assert_eq!(sink.matching("helm.behavior.abstain").len(), 1);
        assert_eq!(sink.matching("helm.behavior.fatal").len(), 1);
        assert_eq!(sink.matching("helm.cycle.halted").len(), 1);
        let events = bus.topic("helm.decision");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["halted"], true);
    }
}

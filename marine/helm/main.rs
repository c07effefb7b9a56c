//! Runtime wiring settings, behaviors, the engine and telemetry behind one
//! lock, so a multi-threaded host runs whole cycles one at a time.
//!
//! Cycles only run while the helm has control. Control is granted when the
//! override variable is set to `false`, revoked when it is set to anything
//! else, and dropped by any halted cycle.

use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::json;
use shared_event_bus::MemoryEventBus;
use shared_logging::LogLevel;
use tracing::{info, warn};

use crate::{
    behavior::{BehaviorFactory, BehaviorSet},
    config::HelmSettings,
    engine::{DecisionReport, HelmEngine},
    state::{StateBuffer, StateStore, StateValue},
    telemetry::HelmTelemetry,
};

/// Shared handle over a configured helm.
#[derive(Debug, Clone)]
pub struct HelmRuntime {
    inner: Arc<Mutex<RuntimeInner>>,
    events: Arc<MemoryEventBus>,
    telemetry: HelmTelemetry,
}

#[derive(Debug)]
struct RuntimeInner {
    engine: HelmEngine,
    behaviors: BehaviorSet,
    store: StateBuffer,
    last_report: Option<DecisionReport>,
    has_control: bool,
    override_var: String,
}

impl HelmRuntime {
    /// Builds a runtime with the built-in behavior kinds.
    pub fn from_settings(settings: &HelmSettings) -> Result<Self> {
        Self::from_settings_with(settings, &BehaviorFactory::default())
    }

    /// Builds a runtime resolving behavior kinds through `factory`.
    pub fn from_settings_with(settings: &HelmSettings, factory: &BehaviorFactory) -> Result<Self> {
        let domain = settings
            .build_domain()
            .context("building decision domain")?;
        let modes = settings.build_modes().context("building mode set")?;
        let behaviors = settings
            .build_behaviors(factory)
            .context("building behaviors")?;

        let events = Arc::new(MemoryEventBus::new(settings.event_capacity));
        let mut builder = HelmTelemetry::builder("helm").event_publisher(events.clone());
        if let Some(path) = &settings.log_path {
            builder = builder.log_path(path);
        }
        let telemetry = builder.build().context("initializing helm telemetry")?;
        let _ = telemetry.log(
            LogLevel::Info,
            "helm.runtime.start",
            0,
            json!({
                "domain": domain.to_string(),
                "modes": modes.len(),
                "behaviors": behaviors.names(),
            }),
        );
        info!(behaviors = behaviors.len(), "helm runtime configured");

        let engine = HelmEngine::new(domain, modes).with_telemetry(telemetry.clone());
        Ok(Self {
            inner: Arc::new(Mutex::new(RuntimeInner {
                engine,
                behaviors,
                store: StateBuffer::new(),
                last_report: None,
                has_control: settings.start_in_control,
                override_var: settings.override_var.clone(),
            })),
            events,
            telemetry,
        })
    }

    /// Bus carrying `helm.decision` events.
    #[must_use]
    pub fn events(&self) -> Arc<MemoryEventBus> {
        Arc::clone(&self.events)
    }

    /// Telemetry handle used by the engine.
    #[must_use]
    pub const fn telemetry(&self) -> &HelmTelemetry {
        &self.telemetry
    }

    /// Writes a numeric input.
    pub fn update_number(&self, name: &str, value: f64) {
        self.inner.lock().store.set(name, StateValue::Number(value));
    }

    /// Writes a textual input. Writing the override variable also grants
    /// or revokes control.
    pub fn update_text(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.inner.lock();
        if name == inner.override_var {
            let granted = value.trim().eq_ignore_ascii_case("false");
            if granted != inner.has_control {
                inner.has_control = granted;
                let iteration = inner.engine.iteration();
                self.log_control(granted, iteration, &format!("{name} = {value}"));
            }
        }
        inner.store.set(name, StateValue::Text(value));
    }

    /// Whether the next cycle will run.
    #[must_use]
    pub fn has_control(&self) -> bool {
        self.inner.lock().has_control
    }

    /// Runs one cycle at helm time `time`, then applies the behaviors'
    /// postings to the state store. Returns `None` without touching the
    /// behaviors while the helm lacks control; a halted cycle drops it.
    pub fn run_cycle(&self, time: f64) -> Option<DecisionReport> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.store.set_time(time);
        if !inner.has_control {
            return None;
        }
        let report = inner
            .engine
            .determine_next_decision(&mut inner.behaviors, &mut inner.store);
        for posting in &report.postings {
            inner.store.set(&posting.var, posting.value.clone());
        }
        if report.halted {
            inner.has_control = false;
            let reason = report
                .halt_reason
                .as_ref()
                .map_or_else(|| "halted".to_string(), ToString::to_string);
            self.log_control(false, report.iteration, &reason);
        }
        inner.last_report = Some(report.clone());
        Some(report)
    }

    fn log_control(&self, granted: bool, iteration: u64, cause: &str) {
        if granted {
            info!(cause, "helm control on");
        } else {
            warn!(cause, "helm control off");
        }
        let (level, message) = if granted {
            (LogLevel::Info, "helm.control.on")
        } else {
            (LogLevel::Warn, "helm.control.off")
        };
        let _ = self
            .telemetry
            .log(level, message, iteration, json!({ "cause": cause }));
    }

    /// Copy of the state store.
    #[must_use]
    pub fn state(&self) -> IndexMap<String, StateValue> {
        self.inner.lock().store.snapshot()
    }

    /// Current value of one variable.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<StateValue> {
        self.inner.lock().store.get(name).cloned()
    }

    /// Report of the most recent cycle.
    #[must_use]
    pub fn last_report(&self) -> Option<DecisionReport> {
        self.inner.lock().last_report.clone()
    }

    /// Variables the host should refresh before each cycle.
    #[must_use]
    pub fn info_vars(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut vars = inner.engine.modes().condition_vars();
        for var in inner.behaviors.info_vars() {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Posting;
    use tempfile::tempdir;

    const SETTINGS: &str = r#"
domain = ["course:0:359:360", "speed:0:4:41"]

modes = ["""
var = MODE
value = SURVEY
condition = DEPLOY = true
"""]

[[behaviors]]
kind = "waypoint"
params = """
name = leg
points = 0,100
speed = 2
condition = MODE = SURVEY
runflag = LEG_ACTIVE = true
"""
"#;

    fn runtime(log: &std::path::Path) -> HelmRuntime {
        let mut settings = HelmSettings::from_toml(SETTINGS).unwrap();
        settings.log_path = Some(log.to_path_buf());
        HelmRuntime::from_settings(&settings).unwrap()
    }

    #[test]
    fn cycles_apply_postings_and_publish() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("helm.log");
        let helm = runtime(&log);
        assert_eq!(
            helm.info_vars(),
            vec!["DEPLOY", "MODE", "NAV_X", "NAV_Y"]
        );

        helm.update_text("DEPLOY", "true");
        helm.update_number("NAV_X", 0.0);
        helm.update_number("NAV_Y", 0.0);
        let report = helm.run_cycle(1.0).unwrap();
        assert!(report.complete);
        assert!(report.decision("course").unwrap().abs() < 1e-9);
        assert!((report.decision("speed").unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(report.postings, vec![Posting::new("LEG_ACTIVE", "true")]);
        assert_eq!(helm.value("LEG_ACTIVE"), Some(StateValue::Text("true".into())));
        assert_eq!(helm.value("MODE"), Some(StateValue::Text("SURVEY".into())));

        helm.update_number("NAV_Y", 99.0);
        let arrived = helm.run_cycle(2.0).unwrap();
        assert!(arrived.halted);
        assert!(!helm.has_control());
        assert_eq!(arrived.completed, vec!["leg".to_string()]);
        assert_eq!(helm.value("WPT_INDEX"), Some(StateValue::Number(1.0)));
        assert_eq!(helm.last_report().unwrap().iteration, 2);

        assert_eq!(helm.events().topic("helm.decision").len(), 2);
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("helm.runtime.start"));
        assert!(content.contains("helm.cycle.complete"));
        assert!(content.contains("helm.cycle.halted"));
        assert!(content.contains("helm.control.off"));
    }

    #[test]
    fn override_variable_gates_cycles() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("helm.log");
        let mut settings = HelmSettings::from_toml(SETTINGS).unwrap();
        settings.log_path = Some(log.clone());
        settings.start_in_control = false;
        let helm = HelmRuntime::from_settings(&settings).unwrap();
        helm.update_text("DEPLOY", "true");
        helm.update_number("NAV_X", 0.0);
        helm.update_number("NAV_Y", 0.0);

        assert!(!helm.has_control());
        assert!(helm.run_cycle(1.0).is_none());
        assert!(helm.last_report().is_none());
        assert_eq!(helm.value("MODE"), None);

        helm.update_text("MANUAL_OVERRIDE", "FALSE");
        assert!(helm.has_control());
        let report = helm.run_cycle(2.0).unwrap();
        assert_eq!(report.iteration, 1);
        assert!(report.complete);

        helm.update_text("MANUAL_OVERRIDE", "true");
        assert!(helm.run_cycle(3.0).is_none());
        assert_eq!(
            helm.value("MANUAL_OVERRIDE"),
            Some(StateValue::Text("true".into()))
        );
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("helm.control.on"));
        assert!(content.contains("helm.control.off"));
    }

    #[test]
    fn bad_settings_are_rejected_with_context() {
        let mut settings = HelmSettings::from_toml(SETTINGS).unwrap();
        settings.behaviors[0].params.push_str("\nlead = 8\n");
        let err = HelmRuntime::from_settings(&settings).unwrap_err();
        assert!(format!("{err:#}").contains("building behaviors"));
    }

    #[test]
    fn clones_share_one_helm() {
        let tmp = tempdir().unwrap();
        let helm = runtime(&tmp.path().join("helm.log"));
        let other = helm.clone();
        other.update_number("NAV_X", 4.0);
        assert_eq!(helm.state().get("NAV_X"), Some(&StateValue::Number(4.0)));
    }
}

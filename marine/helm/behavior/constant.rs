//! Fixed heading and fixed speed preferences.

use super::{
    apply_param, geometry, parse_non_negative, parse_number, unknown_param, vote, Behavior,
    BehaviorCore, BehaviorOutcome, CycleContext,
};
use crate::{error::HelmError, function::peak::PeakFunction};

/// Votes for one heading over the course axis only.
#[derive(Debug, Clone)]
pub struct ConstantHeading {
    core: BehaviorCore,
    heading: f64,
    base_width: f64,
    peak_width: f64,
}

impl Default for ConstantHeading {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("constant_heading"),
            heading: 0.0,
            base_width: 90.0,
            peak_width: 0.0,
        }
    }
}

impl ConstantHeading {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        Ok(behavior)
    }
}

impl Behavior for ConstantHeading {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "heading" | "course" => self.heading = parse_number(key, value)?,
            "basewidth" | "base_width" => self.base_width = parse_non_negative(key, value)?,
            "peakwidth" | "peak_width" => self.peak_width = parse_non_negative(key, value)?,
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        let map = PeakFunction::new(ctx.domain, "course").and_then(|peak| {
            peak.summit(geometry::angle360(self.heading))
                .peak_width(self.peak_width)
                .base_width(self.base_width)
                .wrap(true)
                .extract()
        });
        vote(&self.core, map)
    }
}

/// Votes for one speed over the speed axis only.
#[derive(Debug, Clone)]
pub struct ConstantSpeed {
    core: BehaviorCore,
    speed: f64,
    base_width: f64,
}

impl Default for ConstantSpeed {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("constant_speed"),
            speed: 0.0,
            base_width: 1.0,
        }
    }
}

impl ConstantSpeed {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        Ok(behavior)
    }
}

impl Behavior for ConstantSpeed {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "speed" => self.speed = parse_non_negative(key, value)?,
            "basewidth" | "base_width" => self.base_width = parse_non_negative(key, value)?,
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        vote(
            &self.core,
            super::speed_map(ctx.domain, self.speed, self.base_width),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::DecisionDomain, state::StateBuffer};

    fn run(behavior: &mut dyn Behavior, domain: &DecisionDomain) -> BehaviorOutcome {
        let store = StateBuffer::new();
        let ctx = CycleContext {
            store: &store,
            domain,
            time: 0.0,
            iteration: 0,
        };
        behavior.on_run_state(&ctx)
    }

    #[test]
    fn heading_votes_course_only() {
        let domain = DecisionDomain::parse(&["course:0:359:360", "speed:0:4:41"]).unwrap();
        let mut behavior =
            ConstantHeading::with_params(&[("heading", "-90"), ("pwt", "50")]).unwrap();
        let BehaviorOutcome::Vote(function) = run(&mut behavior, &domain) else {
            panic!("expected a vote");
        };
        assert_eq!(function.axis_names(), vec!["course"]);
        assert_eq!(function.map().argmax().unwrap().point, vec![270]);
        assert!((function.weight() - 50.0).abs() < f64::EPSILON);
        assert_eq!(function.descriptor(), "constant_heading");
    }

    #[test]
    fn speed_votes_speed_only() {
        let domain = DecisionDomain::parse(&["course:0:359:360", "speed:0:4:41"]).unwrap();
        let mut behavior =
            ConstantSpeed::with_params(&[("speed", "2.5"), ("name", "cruise")]).unwrap();
        let BehaviorOutcome::Vote(function) = run(&mut behavior, &domain) else {
            panic!("expected a vote");
        };
        assert_eq!(function.axis_names(), vec!["speed"]);
        assert_eq!(function.map().argmax().unwrap().point, vec![25]);
        assert_eq!(function.descriptor(), "cruise");
    }

    #[test]
    fn missing_axis_is_fatal() {
        let domain = DecisionDomain::parse(&["speed:0:4:41"]).unwrap();
        let mut behavior = ConstantHeading::with_params(&[("heading", "90")]).unwrap();
        assert!(matches!(
            run(&mut behavior, &domain),
            BehaviorOutcome::Fatal(_)
        ));
    }
}

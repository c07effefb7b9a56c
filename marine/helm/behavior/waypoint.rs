//! Waypoint following.

use super::{
    apply_param, course_speed_map, geometry, parse_non_negative, unknown_param, vote, Behavior,
    BehaviorCore, BehaviorOutcome, CycleContext,
};
use crate::error::HelmError;

/// Steers through an ordered list of points at a set speed, completing
/// after the last one (or after `repeat` extra laps).
#[derive(Debug, Clone)]
pub struct Waypoint {
    core: BehaviorCore,
    points: Vec<(f64, f64)>,
    speed: f64,
    capture_radius: f64,
    course_width: f64,
    speed_width: f64,
    repeat: u32,
    index: usize,
    laps: u32,
}

impl Default for Waypoint {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("waypoint"),
            points: Vec::new(),
            speed: 1.0,
            capture_radius: 3.0,
            course_width: 90.0,
            speed_width: 1.0,
            repeat: 0,
            index: 0,
            laps: 0,
        }
    }
}

impl Waypoint {
    /// Index of the point currently steered to.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.index
    }

    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        behavior.validate()?;
        Ok(behavior)
    }

    fn advance(&mut self) {
        self.index += 1;
        if self.index >= self.points.len() && self.laps < self.repeat {
            self.index = 0;
            self.laps += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let index = self.index as f64;
        self.core.post("WPT_INDEX", index);
    }
}

impl Behavior for Waypoint {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "points" | "polygon" => self.points = geometry::parse_points(key, value)?,
            "point" => self.points.push(geometry::parse_point(key, value)?),
            "speed" => self.speed = parse_non_negative(key, value)?,
            "capture_radius" | "radius" => {
                let radius = parse_non_negative(key, value)?;
                if radius <= 0.0 {
                    return Err(HelmError::invalid(key, value));
                }
                self.capture_radius = radius;
            }
            "course_width" => self.course_width = parse_non_negative(key, value)?,
            "speed_width" => self.speed_width = parse_non_negative(key, value)?,
            "repeat" => {
                self.repeat = value
                    .parse()
                    .map_err(|_| HelmError::invalid(key, value))?;
            }
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), HelmError> {
        if self.points.is_empty() {
            return Err(HelmError::Block(format!(
                "waypoint `{}` needs `points`",
                self.core.name()
            )));
        }
        Ok(())
    }

    fn info_vars(&self) -> Vec<String> {
        vec!["NAV_X".into(), "NAV_Y".into()]
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        let own = match ctx.own_position() {
            Ok(own) => own,
            Err(err) => return BehaviorOutcome::Abstain(err.to_string()),
        };
        while let Some(&target) = self.points.get(self.index) {
            if geometry::distance(own, target) > self.capture_radius {
                break;
            }
            self.advance();
        }
        let Some(&target) = self.points.get(self.index) else {
            self.core.request_completion();
            return BehaviorOutcome::Pass;
        };
        let heading = geometry::bearing(own, target);
        vote(
            &self.core,
            course_speed_map(ctx.domain, heading, self.course_width, self.speed, self.speed_width),
        )
    }

    fn on_reset(&mut self) {
        self.index = 0;
        self.laps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        behavior::{LifecycleState, Posting},
        domain::DecisionDomain,
        state::{StateBuffer, StateStore},
    };

    fn domain() -> DecisionDomain {
        DecisionDomain::parse(&["course:0:359:360", "speed:0:4:41"]).unwrap()
    }

    fn run(behavior: &mut Waypoint, x: f64, y: f64) -> BehaviorOutcome {
        let mut store = StateBuffer::new();
        store.set("NAV_X", x.into());
        store.set("NAV_Y", y.into());
        let domain = domain();
        let ctx = CycleContext {
            store: &store,
            domain: &domain,
            time: 0.0,
            iteration: 0,
        };
        behavior.on_run_state(&ctx)
    }

    fn decision(outcome: &BehaviorOutcome) -> Vec<usize> {
        match outcome {
            BehaviorOutcome::Vote(function) => function.map().argmax().unwrap().point,
            other => panic!("expected a vote, got {other:?}"),
        }
    }

    #[test]
    fn steers_toward_current_point_at_speed() {
        let mut behavior =
            Waypoint::with_params(&[("points", "0,100:100,100"), ("speed", "2.0")]).unwrap();
        let outcome = run(&mut behavior, 0.0, 0.0);
        assert_eq!(decision(&outcome), vec![0, 20]);
    }

    #[test]
    fn captures_and_advances() {
        let mut behavior =
            Waypoint::with_params(&[("points", "0,100:100,97"), ("capture_radius", "5")])
                .unwrap();
        let outcome = run(&mut behavior, 0.0, 97.0);
        assert_eq!(behavior.current_index(), 1);
        assert_eq!(decision(&outcome)[0], 90);
        assert_eq!(
            behavior.core_mut().take_postings(),
            vec![Posting::new("WPT_INDEX", 1.0)]
        );
    }

    #[test]
    fn completes_after_last_point() {
        let mut behavior = Waypoint::with_params(&[("points", "0,10")]).unwrap();
        behavior.core_mut().finish_configuration();
        let outcome = run(&mut behavior, 0.0, 9.0);
        assert_eq!(outcome, BehaviorOutcome::Pass);
        assert!(!behavior.core_mut().settle(1.0));
        assert_eq!(behavior.core().state(), LifecycleState::Completed);
    }

    #[test]
    fn repeat_wraps_to_first_point() {
        let mut behavior =
            Waypoint::with_params(&[("points", "0,10:0,20"), ("repeat", "1")]).unwrap();
        run(&mut behavior, 0.0, 10.0);
        run(&mut behavior, 0.0, 20.0);
        assert_eq!(behavior.current_index(), 0);
    }

    #[test]
    fn missing_position_abstains() {
        let mut behavior = Waypoint::with_params(&[("points", "0,10")]).unwrap();
        let store = StateBuffer::new();
        let domain = domain();
        let ctx = CycleContext {
            store: &store,
            domain: &domain,
            time: 0.0,
            iteration: 0,
        };
        assert!(matches!(
            behavior.on_run_state(&ctx),
            BehaviorOutcome::Abstain(reason) if reason.contains("NAV_X")
        ));
        assert_eq!(store.number("NAV_X"), None);
    }

    #[test]
    fn config_errors() {
        assert!(Waypoint::with_params(&[]).is_err());
        assert!(matches!(
            Waypoint::with_params(&[("points", "0,10"), ("lead", "4")]),
            Err(HelmError::UnknownParam { .. })
        ));
        assert!(Waypoint::with_params(&[("points", "0,10"), ("speed", "-1")]).is_err());
    }
}

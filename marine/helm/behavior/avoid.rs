//! Contact avoidance.

use super::{
    apply_param, geometry, parse_non_negative, unknown_param, Behavior, BehaviorCore,
    BehaviorOutcome, CycleContext,
};
use crate::{
    domain::DecisionDomain,
    error::HelmError,
    function::{
        reflector::{BuildInfo, Reflector},
        region::Region,
        IvpFunction, PartitionMap,
    },
};

/// Course indices per uniform cell of the reflected map.
const COURSE_PIECE: usize = 15;
/// Indices on each side of the away heading fitted point by point.
const FOCUS_RADIUS: usize = 7;
/// Worst-fit splits after the focus pass.
const SMART_SPLITS: usize = 4;

/// Prefers courses pointing away from a contact. Utility is 100 on the
/// away heading and falls linearly to 0 at `course_width` degrees from it.
/// The vote weight grows from zero at `active_range` to the full priority
/// at `collision_range`; beyond `active_range` the behavior passes.
///
/// The contact position is read from `<CONTACT>_X` and `<CONTACT>_Y`.
#[derive(Debug, Clone)]
pub struct AvoidContact {
    core: BehaviorCore,
    contact: Option<String>,
    active_range: f64,
    collision_range: f64,
    course_width: f64,
}

impl Default for AvoidContact {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("avoid_contact"),
            contact: None,
            active_range: 100.0,
            collision_range: 20.0,
            course_width: 120.0,
        }
    }
}

impl AvoidContact {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        behavior.validate()?;
        Ok(behavior)
    }

    fn contact_vars(&self) -> Option<(String, String)> {
        self.contact
            .as_ref()
            .map(|contact| (format!("{contact}_X"), format!("{contact}_Y")))
    }

    fn relevance(&self, range: f64) -> f64 {
        if range <= self.collision_range {
            1.0
        } else if range >= self.active_range {
            0.0
        } else {
            (self.active_range - range) / (self.active_range - self.collision_range)
        }
    }

    // Reflects the away objective over the course axis, refined point by
    // point around the away heading so the summit is exact.
    fn away_map(&self, domain: &DecisionDomain, away: f64) -> Result<PartitionMap, HelmError> {
        let course = domain.sub_domain(&["course"])?;
        let width = self.course_width.max(f64::EPSILON);
        let objective = move |point: &[f64]| {
            let gap = geometry::heading_gap(point[0], away);
            100.0 * (1.0 - gap / width).max(0.0)
        };
        let last = course.points(0).saturating_sub(1);
        let summit = course.axis(0).map_or(0, |axis| axis.discretize(away));
        let window = Region::from_pairs(&[(
            summit.saturating_sub(FOCUS_RADIUS),
            (summit + FOCUS_RADIUS).min(last),
        )]);
        let info = BuildInfo::new(vec![COURSE_PIECE])
            .refine(window, vec![1])
            .smart_amount(SMART_SPLITS);
        Reflector::new(course, &objective).build(&info)
    }
}

impl Behavior for AvoidContact {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "contact" => {
                if value.is_empty() || value.contains(char::is_whitespace) {
                    return Err(HelmError::invalid(key, value));
                }
                self.contact = Some(value.to_ascii_uppercase());
            }
            "active_range" => self.active_range = parse_non_negative(key, value)?,
            "collision_range" => self.collision_range = parse_non_negative(key, value)?,
            "course_width" => self.course_width = parse_non_negative(key, value)?,
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), HelmError> {
        if self.contact.is_none() {
            return Err(HelmError::Block(format!(
                "avoid_contact `{}` needs `contact`",
                self.core.name()
            )));
        }
        if self.collision_range >= self.active_range {
            return Err(HelmError::invalid(
                "collision_range",
                self.collision_range.to_string(),
            ));
        }
        Ok(())
    }

    fn info_vars(&self) -> Vec<String> {
        let mut vars = vec!["NAV_X".to_string(), "NAV_Y".to_string()];
        if let Some((x, y)) = self.contact_vars() {
            vars.push(x);
            vars.push(y);
        }
        vars
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        let Some((x_var, y_var)) = self.contact_vars() else {
            return BehaviorOutcome::Fatal("no contact configured".into());
        };
        let own = match ctx.own_position() {
            Ok(own) => own,
            Err(err) => return BehaviorOutcome::Abstain(err.to_string()),
        };
        let contact = match (ctx.require_number(&x_var), ctx.require_number(&y_var)) {
            (Ok(x), Ok(y)) => (x, y),
            (Err(err), _) | (_, Err(err)) => return BehaviorOutcome::Abstain(err.to_string()),
        };
        let relevance = self.relevance(geometry::distance(own, contact));
        if relevance <= 0.0 {
            return BehaviorOutcome::Pass;
        }
        let away = geometry::bearing(contact, own);
        match self.away_map(ctx.domain, away) {
            Ok(map) => BehaviorOutcome::Vote(
                IvpFunction::new(map, self.core.priority() * relevance)
                    .with_descriptor(self.core.name()),
            ),
            Err(err) => BehaviorOutcome::Fatal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::DecisionDomain,
        state::{StateBuffer, StateStore},
    };

    fn outcome(behavior: &mut AvoidContact, store: &StateBuffer) -> BehaviorOutcome {
        let domain = DecisionDomain::parse(&["course:0:359:360", "speed:0:4:41"]).unwrap();
        let ctx = CycleContext {
            store,
            domain: &domain,
            time: 0.0,
            iteration: 0,
        };
        behavior.on_run_state(&ctx)
    }

    fn store_with(contact: (f64, f64)) -> StateBuffer {
        let mut store = StateBuffer::new();
        store.set("NAV_X", 0.0.into());
        store.set("NAV_Y", 0.0.into());
        store.set("ALPHA_X", contact.0.into());
        store.set("ALPHA_Y", contact.1.into());
        store
    }

    #[test]
    fn votes_away_with_scaled_weight() {
        let mut behavior =
            AvoidContact::with_params(&[("contact", "alpha"), ("priority", "200")]).unwrap();
        let BehaviorOutcome::Vote(function) = outcome(&mut behavior, &store_with((0.0, 60.0)))
        else {
            panic!("expected a vote");
        };
        let best = function.map().argmax().unwrap();
        assert_eq!(best.point, vec![180]);
        assert!((best.value - 100.0).abs() < 1e-9);
        assert!((function.weight() - 100.0).abs() < 1e-9);
        assert_eq!(function.axis_names(), vec!["course"]);
        assert_eq!(function.map().covered_volume(), 360);
    }

    #[test]
    fn reflected_vote_falls_off_across_course_width() {
        let mut behavior =
            AvoidContact::with_params(&[("contact", "alpha"), ("course_width", "90")]).unwrap();
        // Contact to the north-east: away heading is 225.
        let BehaviorOutcome::Vote(function) = outcome(&mut behavior, &store_with((30.0, 30.0)))
        else {
            panic!("expected a vote");
        };
        let map = function.map();
        assert_eq!(map.argmax().unwrap().point, vec![225]);
        assert!((map.eval(&[270]).unwrap() - 50.0).abs() < 1e-9);
        assert!((map.eval(&[180]).unwrap() - 50.0).abs() < 1e-9);
        assert!(map.eval(&[45]).unwrap().abs() < 1e-9);
    }

    #[test]
    fn summit_near_north_wraps() {
        let mut behavior = AvoidContact::with_params(&[("contact", "alpha")]).unwrap();
        let BehaviorOutcome::Vote(function) = outcome(&mut behavior, &store_with((0.0, -40.0)))
        else {
            panic!("expected a vote");
        };
        let map = function.map();
        assert_eq!(map.argmax().unwrap().point, vec![0]);
        assert!((map.eval(&[359]).unwrap() - map.eval(&[1]).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn passes_out_of_range_and_abstains_without_contact() {
        let mut behavior = AvoidContact::with_params(&[("contact", "alpha")]).unwrap();
        assert_eq!(
            outcome(&mut behavior, &store_with((0.0, 150.0))),
            BehaviorOutcome::Pass
        );
        let mut store = StateBuffer::new();
        store.set("NAV_X", 0.0.into());
        store.set("NAV_Y", 0.0.into());
        assert!(matches!(
            outcome(&mut behavior, &store),
            BehaviorOutcome::Abstain(reason) if reason.contains("ALPHA_X")
        ));
    }

    #[test]
    fn ranges_must_nest() {
        assert!(AvoidContact::with_params(&[
            ("contact", "alpha"),
            ("active_range", "10"),
            ("collision_range", "30"),
        ])
        .is_err());
        assert!(AvoidContact::with_params(&[]).is_err());
    }
}

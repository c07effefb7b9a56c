//! Station keeping.

use super::{
    apply_param, course_speed_map, geometry, parse_non_negative, speed_map,
    unknown_param, vote, Behavior, BehaviorCore, BehaviorOutcome, CycleContext,
};
use crate::{
    error::HelmError,
    function::{coupler::Coupler, IvpFunction, PartitionMap},
};

/// Holds a station: transits toward it when outside `radius`, and asks
/// for zero speed with no course preference inside.
#[derive(Debug, Clone)]
pub struct HoldPosition {
    core: BehaviorCore,
    station: Option<(f64, f64)>,
    speed: f64,
    radius: f64,
}

impl Default for HoldPosition {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("hold_position"),
            station: None,
            speed: 1.0,
            radius: 5.0,
        }
    }
}

impl HoldPosition {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        behavior.validate()?;
        Ok(behavior)
    }

    fn on_station_map(&self, ctx: &CycleContext<'_>) -> Result<PartitionMap, HelmError> {
        let flat_course = PartitionMap::constant(ctx.domain.sub_domain(&["course"])?, 0.0)?;
        let stop = speed_map(ctx.domain, 0.0, self.speed.max(1.0))?;
        let joint = Coupler::new().couple(
            &IvpFunction::new(flat_course, 1.0),
            &IvpFunction::new(stop, 1.0),
        )?;
        Ok(joint.map().clone())
    }
}

impl Behavior for HoldPosition {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "station" | "point" => self.station = Some(geometry::parse_point(key, value)?),
            "speed" => self.speed = parse_non_negative(key, value)?,
            "radius" => self.radius = parse_non_negative(key, value)?,
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), HelmError> {
        if self.station.is_none() {
            return Err(HelmError::Block(format!(
                "hold_position `{}` needs `station`",
                self.core.name()
            )));
        }
        Ok(())
    }

    fn info_vars(&self) -> Vec<String> {
        vec!["NAV_X".into(), "NAV_Y".into()]
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        let Some(station) = self.station else {
            return BehaviorOutcome::Fatal("no station configured".into());
        };
        let own = match ctx.own_position() {
            Ok(own) => own,
            Err(err) => return BehaviorOutcome::Abstain(err.to_string()),
        };
        if geometry::distance(own, station) <= self.radius {
            return vote(&self.core, self.on_station_map(ctx));
        }
        let heading = geometry::bearing(own, station);
        vote(
            &self.core,
            course_speed_map(ctx.domain, heading, 90.0, self.speed, 1.0),
        )
    }
}

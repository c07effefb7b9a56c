//! Timed sentry: alternates between two headings.

use super::{
    apply_param, course_speed_map, parse_non_negative, parse_number, unknown_param, vote,
    Behavior, BehaviorCore, BehaviorOutcome, CycleContext,
};
use crate::error::HelmError;

/// Patrols by holding `heading_a` for `interval` seconds of running time,
/// then `heading_b`, and so on.
#[derive(Debug, Clone)]
pub struct TimedSentry {
    core: BehaviorCore,
    heading_a: f64,
    heading_b: f64,
    interval: f64,
    speed: f64,
    leg: Option<usize>,
}

impl Default for TimedSentry {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("timed_sentry"),
            heading_a: 0.0,
            heading_b: 180.0,
            interval: 60.0,
            speed: 1.0,
            leg: None,
        }
    }
}

impl TimedSentry {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        Ok(behavior)
    }
}

impl Behavior for TimedSentry {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<(), HelmError> {
        match key {
            "heading_a" => self.heading_a = parse_number(key, value)?,
            "heading_b" => self.heading_b = parse_number(key, value)?,
            "interval" => {
                let interval = parse_non_negative(key, value)?;
                if interval <= 0.0 {
                    return Err(HelmError::invalid(key, value));
                }
                self.interval = interval;
            }
            "speed" => self.speed = parse_non_negative(key, value)?,
            _ => return Err(unknown_param(self.core.kind(), key)),
        }
        Ok(())
    }

    fn on_run_state(&mut self, ctx: &CycleContext<'_>) -> BehaviorOutcome {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let leg = (self.core.elapsed(ctx.time) / self.interval).floor() as usize % 2;
        if self.leg != Some(leg) {
            self.leg = Some(leg);
            self.core
                .post("SENTRY_LEG", if leg == 0 { "a" } else { "b" });
        }
        let heading = if leg == 0 {
            self.heading_a
        } else {
            self.heading_b
        };
        vote(&self.core, course_speed_map(ctx.domain, heading, 90.0, self.speed, 1.0))
    }

    fn on_reset(&mut self) {
        self.leg = None;
    }
}

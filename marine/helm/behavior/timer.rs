//! Vote-free timer.

use super::{
    apply_param, unknown_param, Behavior, BehaviorCore, BehaviorOutcome, CycleContext,
};
use crate::error::HelmError;

/// Never votes. Useful for its flags: pair with `duration` and `endflag`
/// to post a variable after some running time.
#[derive(Debug, Clone)]
pub struct Timer {
    core: BehaviorCore,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            core: BehaviorCore::new("timer"),
        }
    }
}

impl Timer {
    /// Builds from parameter pairs.
    pub fn with_params(params: &[(&str, &str)]) -> Result<Self, HelmError> {
        let mut behavior = Self::default();
        for (key, value) in params {
            apply_param(&mut behavior, key, value)?;
        }
        Ok(behavior)
    }
}

impl Behavior for Timer {
    fn core(&self) -> &BehaviorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviorCore {
        &mut self.core
    }

    fn set_param(&mut self, key: &str, _value: &str) -> Result<(), HelmError> {
        Err(unknown_param(self.core.kind(), key))
    }

    fn on_run_state(&mut self, _ctx: &CycleContext<'_>) -> BehaviorOutcome {
        BehaviorOutcome::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{behavior::Posting, domain::DecisionDomain, state::StateBuffer};

    #[test]
    fn posts_end_flag_after_duration() {
        let mut timer =
            Timer::with_params(&[("duration", "5"), ("endflag", "DONE=true")]).unwrap();
        timer.core_mut().finish_configuration();
        let store = StateBuffer::new();
        let domain = DecisionDomain::new();
        let ctx = CycleContext {
            store: &store,
            domain: &domain,
            time: 0.0,
            iteration: 0,
        };
        timer.core_mut().update(&store, 0.0);
        assert_eq!(timer.on_run_state(&ctx), BehaviorOutcome::Pass);
        timer.core_mut().update(&store, 6.0);
        assert!(timer
            .core_mut()
            .take_postings()
            .contains(&Posting::new("DONE", "true")));
    }

    #[test]
    fn rejects_kind_params() {
        assert!(matches!(
            Timer::with_params(&[("speed", "2")]),
            Err(HelmError::UnknownParam { .. })
        ));
    }
}

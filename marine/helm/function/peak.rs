//! One-dimensional peak preference with an exact piecewise-linear map.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    region::{Interval, Polynomial, Region},
    PartitionMap,
};
use crate::{
    domain::{DecisionDomain, DomainAxis},
    error::HelmError,
};

/// Peak-shaped utility over one axis.
///
/// Utility is `max_util` at the summit, falls linearly by `summit_delta`
/// across `peak_width`, then linearly to `min_util` across `base_width`,
/// and stays at `min_util` beyond. With `wrap` the distance to the summit
/// is measured around the axis, as for a compass course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakFunction {
    domain: DecisionDomain,
    summit: f64,
    peak_width: f64,
    base_width: f64,
    summit_delta: f64,
    min_util: f64,
    max_util: f64,
    wrap: bool,
}

impl PeakFunction {
    /// Peak over the named axis of `domain`, summit at the axis low end,
    /// utility 0 to 100.
    pub fn new(domain: &DecisionDomain, axis: &str) -> Result<Self, HelmError> {
        let domain = domain.sub_domain(&[axis])?;
        let low = domain.axes()[0].low;
        Ok(Self {
            domain,
            summit: low,
            peak_width: 0.0,
            base_width: 0.0,
            summit_delta: 0.0,
            min_util: 0.0,
            max_util: 100.0,
            wrap: false,
        })
    }

    /// Value of highest utility.
    #[must_use]
    pub const fn summit(mut self, summit: f64) -> Self {
        self.summit = summit;
        self
    }

    /// Distance over which utility drops by the summit delta.
    #[must_use]
    pub const fn peak_width(mut self, width: f64) -> Self {
        self.peak_width = width;
        self
    }

    /// Distance over which utility falls from the shoulder to the minimum.
    #[must_use]
    pub const fn base_width(mut self, width: f64) -> Self {
        self.base_width = width;
        self
    }

    /// Drop across the peak width.
    #[must_use]
    pub const fn summit_delta(mut self, delta: f64) -> Self {
        self.summit_delta = delta;
        self
    }

    /// Utility range.
    #[must_use]
    pub const fn utility_range(mut self, min_util: f64, max_util: f64) -> Self {
        self.min_util = min_util;
        self.max_util = max_util;
        self
    }

    /// Measures distance around the axis.
    #[must_use]
    pub const fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    fn axis(&self) -> &DomainAxis {
        &self.domain.axes()[0]
    }

    fn span(&self) -> f64 {
        let axis = self.axis();
        axis.high - axis.low + axis.delta()
    }

    fn validate(&self) -> Result<(), HelmError> {
        let finite = [
            self.summit,
            self.peak_width,
            self.base_width,
            self.summit_delta,
            self.min_util,
            self.max_util,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite {
            return Err(HelmError::invalid("peak", "non-finite parameter"));
        }
        if self.peak_width < 0.0 {
            return Err(HelmError::invalid("peakwidth", self.peak_width.to_string()));
        }
        if self.base_width < 0.0 {
            return Err(HelmError::invalid("basewidth", self.base_width.to_string()));
        }
        if self.min_util > self.max_util {
            return Err(HelmError::invalid(
                "utility_range",
                format!("{}..{}", self.min_util, self.max_util),
            ));
        }
        if self.summit_delta < 0.0 || self.summit_delta > self.max_util - self.min_util {
            return Err(HelmError::invalid(
                "summitdelta",
                self.summit_delta.to_string(),
            ));
        }
        Ok(())
    }

    fn distance(&self, value: f64) -> f64 {
        let raw = (value - self.summit).abs();
        let span = self.span();
        if self.wrap && span > 0.0 {
            let folded = raw % span;
            folded.min(span - folded)
        } else {
            raw
        }
    }

    /// Utility at a domain value.
    #[must_use]
    pub fn utility(&self, value: f64) -> f64 {
        let d = self.distance(value);
        let shoulder = if self.peak_width > 0.0 {
            self.max_util - self.summit_delta
        } else {
            self.max_util
        };
        if d <= self.peak_width {
            if self.peak_width > 0.0 {
                self.max_util - self.summit_delta * d / self.peak_width
            } else {
                self.max_util
            }
        } else if d <= self.peak_width + self.base_width {
            shoulder - (shoulder - self.min_util) * (d - self.peak_width) / self.base_width
        } else {
            self.min_util
        }
    }

    fn kinks(&self) -> Vec<f64> {
        let offsets = [
            0.0,
            self.peak_width,
            -self.peak_width,
            self.peak_width + self.base_width,
            -(self.peak_width + self.base_width),
        ];
        let mut kinks: Vec<f64> = offsets.iter().map(|offset| self.summit + offset).collect();
        if self.wrap {
            let span = self.span();
            let base: Vec<f64> = kinks.clone();
            for kink in base {
                kinks.push(kink + span);
                kinks.push(kink - span);
            }
            kinks.push(self.summit + span / 2.0);
            kinks.push(self.summit - span / 2.0);
        }
        kinks
    }

    /// Exact degree-1 partition map of the utility over the axis grid.
    pub fn extract(&self) -> Result<PartitionMap, HelmError> {
        self.validate()?;
        let axis = self.axis().clone();
        let last = axis.points - 1;
        let delta = axis.delta();

        let mut starts = BTreeSet::from([0_usize]);
        if delta > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let last_position = last as f64;
            for kink in self.kinks() {
                let position = ((kink - axis.low) / delta).ceil();
                if position > 0.0 && position <= last_position {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let index = position as usize;
                    starts.insert(index);
                }
            }
            let summit = axis.discretize(self.summit);
            starts.insert(summit);
            if summit < last {
                starts.insert(summit + 1);
            }
        }

        let starts: Vec<usize> = starts.into_iter().collect();
        let mut regions = Vec::with_capacity(starts.len());
        for (i, &lo) in starts.iter().enumerate() {
            let hi = starts.get(i + 1).map_or(last, |next| next - 1);
            let u_lo = self.utility(axis.value_at(lo));
            let u_hi = self.utility(axis.value_at(hi));
            let mut poly = Polynomial::zero(1, 1)?;
            #[allow(clippy::cast_precision_loss)]
            let slope = if hi > lo {
                (u_hi - u_lo) / (hi - lo) as f64
            } else {
                0.0
            };
            #[allow(clippy::cast_precision_loss)]
            let lo_position = lo as f64;
            poly.set_linear(0, slope);
            poly.set_constant(slope.mul_add(-lo_position, u_lo));
            regions.push(Region::new(vec![Interval::new(lo, hi)]).with_poly(poly));
        }
        PartitionMap::new(self.domain.clone(), regions, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DecisionDomain {
        DecisionDomain::parse(&["course:0:359:360", "speed:0:5:51"]).unwrap()
    }

    fn assert_exact(peak: &PeakFunction, map: &PartitionMap) {
        let axis = &map.domain().axes()[0];
        for index in 0..axis.points {
            let expected = peak.utility(axis.value_at(index));
            let got = map.eval(&[index]).unwrap();
            assert!((expected - got).abs() < 1e-9, "index {index}: {expected} vs {got}");
        }
    }

    #[test]
    fn wrapped_course_peak_is_exact_and_small() {
        let peak = PeakFunction::new(&domain(), "course")
            .unwrap()
            .summit(10.0)
            .base_width(90.0)
            .wrap(true);
        let map = peak.extract().unwrap();
        assert!(map.len() <= 8, "{} regions", map.len());
        assert_exact(&peak, &map);
        assert_eq!(map.argmax().unwrap().point, vec![10]);
        assert!((peak.utility(350.0) - (100.0 - 100.0 * 20.0 / 90.0)).abs() < 1e-9);
        assert!(peak.utility(190.0).abs() < 1e-12);
    }

    #[test]
    fn off_grid_summit_and_peak_width() {
        let peak = PeakFunction::new(&domain(), "speed")
            .unwrap()
            .summit(2.37)
            .peak_width(0.5)
            .summit_delta(10.0)
            .base_width(1.0)
            .utility_range(5.0, 50.0);
        let map = peak.extract().unwrap();
        assert_exact(&peak, &map);
        assert_eq!(map.argmax().unwrap().point, vec![24]);
        assert!((peak.utility(5.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        let base = PeakFunction::new(&domain(), "course").unwrap();
        assert!(base.clone().peak_width(-1.0).extract().is_err());
        assert!(base.clone().utility_range(10.0, 5.0).extract().is_err());
        assert!(base.clone().summit_delta(200.0).extract().is_err());
        assert!(PeakFunction::new(&domain(), "depth").is_err());
    }
}

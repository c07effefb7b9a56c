//! Fits region polynomials to an objective function by sampling.

use std::fmt;

use super::region::{Interval, Polynomial, Region};
use crate::{domain::DecisionDomain, error::HelmError};

/// Objective evaluated at domain values (not grid indices), one per axis.
pub trait ObjectiveFn {
    /// Preference at the point.
    fn eval(&self, point: &[f64]) -> f64;
}

impl<F> ObjectiveFn for F
where
    F: Fn(&[f64]) -> f64,
{
    fn eval(&self, point: &[f64]) -> f64 {
        self(point)
    }
}

/// Samples an objective over a domain and fits region polynomials of a
/// fixed degree.
pub struct Regressor<'a> {
    domain: &'a DecisionDomain,
    objective: &'a dyn ObjectiveFn,
    degree: u8,
}

impl fmt::Debug for Regressor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regressor")
            .field("domain", &self.domain.to_string())
            .field("degree", &self.degree)
            .finish_non_exhaustive()
    }
}

impl<'a> Regressor<'a> {
    /// Creates a regressor; the degree must be 0, 1 or 2.
    pub fn new(
        domain: &'a DecisionDomain,
        objective: &'a dyn ObjectiveFn,
        degree: u8,
    ) -> Result<Self, HelmError> {
        if degree > 2 {
            return Err(HelmError::invalid("degree", degree.to_string()));
        }
        Ok(Self {
            domain,
            objective,
            degree,
        })
    }

    /// Domain being sampled.
    #[must_use]
    pub const fn domain(&self) -> &DecisionDomain {
        self.domain
    }

    /// Fitted degree.
    #[must_use]
    pub const fn degree(&self) -> u8 {
        self.degree
    }

    /// Objective value at a grid point.
    #[must_use]
    pub fn sample(&self, point: &[usize]) -> f64 {
        let values: Vec<f64> = point
            .iter()
            .enumerate()
            .map(|(axis, &index)| self.domain.axis(axis).map_or(0.0, |a| a.value_at(index)))
            .collect();
        self.objective.eval(&values)
    }

    /// Fits the region's polynomial in place and returns the worst absolute
    /// error seen at the sample points.
    pub fn fit(&self, region: &mut Region) -> f64 {
        let center = region.center();
        let base = self.sample(&center);
        let dims = region.dims();
        let mut poly = Polynomial::constant(base, dims);
        if self.degree > 0 {
            if let Ok(zero) = Polynomial::zero(self.degree, dims) {
                poly = zero;
            }
            let mut constant = base;
            for (axis, interval) in region.bounds().iter().enumerate() {
                let (k, b, a) = self.fit_axis(&center, axis, *interval, base);
                constant += k;
                poly.set_linear(axis, b);
                poly.set_quadratic(axis, a);
            }
            poly.set_constant(constant);
        }
        region.set_poly(poly);
        self.sample_points(region)
            .iter()
            .map(|point| (self.sample(point) - region.poly().eval(point)).abs())
            .fold(0.0, f64::max)
    }

    // Returns (constant, linear, quadratic) of g(x) with g(center) = 0.
    fn fit_axis(
        &self,
        center: &[usize],
        axis: usize,
        interval: Interval,
        base: f64,
    ) -> (f64, f64, f64) {
        let at = |index: usize| {
            let mut point = center.to_vec();
            point[axis] = index;
            self.sample(&point) - base
        };
        #[allow(clippy::cast_precision_loss)]
        let (x0, x1, x2) = (
            interval.lo as f64,
            center[axis] as f64,
            interval.hi as f64,
        );
        if interval.width() == 1 {
            return (0.0, 0.0, 0.0);
        }
        let (v0, v2) = (at(interval.lo), at(interval.hi));
        if self.degree == 1 || interval.width() < 3 {
            let slope = (v2 - v0) / (x2 - x0);
            return (-slope * x1, slope, 0.0);
        }
        let d1 = (0.0 - v0) / (x1 - x0);
        let d2 = (v2 - 0.0) / (x2 - x1);
        let a = (d2 - d1) / (x2 - x0);
        let b = a.mul_add(-(x0 + x1), d1);
        let k = v0 - a * x0 * x0 - b * x0;
        (k, b, a)
    }

    fn sample_points(&self, region: &Region) -> Vec<Vec<usize>> {
        let center = region.center();
        let mut points = vec![center.clone()];
        for (axis, interval) in region.bounds().iter().enumerate() {
            let quarter_low = interval.lo + (center[axis] - interval.lo) / 2;
            let quarter_high = center[axis] + (interval.hi - center[axis]).div_ceil(2);
            for index in [interval.lo, quarter_low, quarter_high, interval.hi] {
                let mut point = center.clone();
                point[axis] = index;
                points.push(point);
            }
        }
        if region.dims() <= 3 {
            let corners = 1_usize << region.dims();
            for mask in 0..corners {
                points.push(
                    region
                        .bounds()
                        .iter()
                        .enumerate()
                        .map(|(axis, interval)| {
                            if mask & (1 << axis) == 0 {
                                interval.lo
                            } else {
                                interval.hi
                            }
                        })
                        .collect(),
                );
            }
        }
        points
    }
}

//! Builds partition maps from objective functions.

use std::fmt;

use tracing::{debug, instrument};

use super::{
    focus::refine,
    queue::RefineQueue,
    region::Region,
    regressor::{ObjectiveFn, Regressor},
    PartitionMap,
};
use crate::{domain::DecisionDomain, error::HelmError};

/// How a map is built: uniform cell size, focus refinements applied in
/// order, then priority-driven splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildInfo {
    uniform_piece: Vec<usize>,
    refinements: Vec<(Region, Vec<usize>)>,
    smart_amount: usize,
    degree: u8,
}

impl BuildInfo {
    /// Uniform tiling at `uniform_piece` indices per axis, degree 1.
    #[must_use]
    pub fn new(uniform_piece: Vec<usize>) -> Self {
        Self {
            uniform_piece,
            refinements: Vec::new(),
            smart_amount: 0,
            degree: 1,
        }
    }

    /// Adds a focus refinement of `region` at `piece` indices per axis.
    #[must_use]
    pub fn refine(mut self, region: Region, piece: Vec<usize>) -> Self {
        self.refinements.push((region, piece));
        self
    }

    /// Number of extra pieces created by splitting the worst-fit regions.
    #[must_use]
    pub const fn smart_amount(mut self, amount: usize) -> Self {
        self.smart_amount = amount;
        self
    }

    /// Polynomial degree of the fitted regions.
    #[must_use]
    pub const fn degree(mut self, degree: u8) -> Self {
        self.degree = degree;
        self
    }
}

/// Turns an objective over a domain into a partition map.
pub struct Reflector<'a> {
    domain: DecisionDomain,
    objective: &'a dyn ObjectiveFn,
}

impl fmt::Debug for Reflector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field("domain", &self.domain.to_string())
            .finish_non_exhaustive()
    }
}

impl<'a> Reflector<'a> {
    /// Creates a reflector over `domain`.
    #[must_use]
    pub fn new(domain: DecisionDomain, objective: &'a dyn ObjectiveFn) -> Self {
        Self { domain, objective }
    }

    /// Builds a map according to `info`.
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub fn build(&self, info: &BuildInfo) -> Result<PartitionMap, HelmError> {
        let regressor = Regressor::new(&self.domain, self.objective, info.degree)?;
        let mut map = PartitionMap::uniform(self.domain.clone(), &info.uniform_piece, info.degree)?;
        let mut queue = RefineQueue::new();
        for (index, region) in map.regions_mut().iter_mut().enumerate() {
            queue.push(index, regressor.fit(region));
        }

        for (region, piece) in &info.refinements {
            refine(&mut map, region, piece, &regressor, Some(&mut queue))?;
        }

        let mut created = 0;
        while created < info.smart_amount {
            let Some((key, priority)) = queue.pop() else {
                break;
            };
            if priority <= 0.0 {
                break;
            }
            let Some(region) = map.region(key) else {
                continue;
            };
            let Some((mut low, mut high)) =
                region.longest_axis().and_then(|axis| region.split(axis))
            else {
                continue;
            };
            let low_error = regressor.fit(&mut low);
            let high_error = regressor.fit(&mut high);
            let regions = map.regions_mut();
            regions[key] = low;
            regions.push(high);
            let high_key = regions.len() - 1;
            queue.push(key, low_error);
            queue.push(high_key, high_error);
            created += 1;
        }

        map.check_coverage()?;
        debug!(regions = map.len(), split = created, "partition map built");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_domain() -> DecisionDomain {
        DecisionDomain::parse(&["course:0:359:360"]).unwrap()
    }

    #[test]
    fn uniform_build_fits_every_region() {
        let domain = course_domain();
        let objective = |p: &[f64]| 2.0 * p[0];
        let map = Reflector::new(domain, &objective)
            .build(&BuildInfo::new(vec![40]))
            .unwrap();
        assert_eq!(map.len(), 9);
        assert!((map.eval(&[215]).unwrap() - 430.0).abs() < 1e-9);
        assert_eq!(map.argmax().unwrap().point, vec![359]);
    }

    #[test]
    fn focus_refinement_adds_cells() {
        let domain = course_domain();
        let objective = |p: &[f64]| -(p[0] - 90.0).abs();
        let info = BuildInfo::new(vec![90])
            .refine(Region::from_pairs(&[(80, 99)]), vec![2])
            .degree(1);
        let map = Reflector::new(domain.clone(), &objective).build(&info).unwrap();
        assert_eq!(map.covered_volume(), domain.volume());
        assert_eq!(map.len(), 2 + 2 + 10);
        assert_eq!(map.argmax().unwrap().point, vec![90]);
    }

    #[test]
    fn smart_splits_target_worst_fit() {
        let domain = course_domain();
        let objective = |p: &[f64]| -(p[0] - 200.0).abs();
        let info = BuildInfo::new(vec![360]).smart_amount(6);
        let map = Reflector::new(domain.clone(), &objective).build(&info).unwrap();
        assert_eq!(map.len(), 7);
        assert_eq!(map.covered_volume(), domain.volume());
        let best = map.argmax().unwrap();
        assert!(best.point[0].abs_diff(200) <= 10, "{:?}", best.point);
    }

    #[test]
    fn bad_refinement_fails_build() {
        let objective = |_: &[f64]| 0.0;
        let info = BuildInfo::new(vec![10]).refine(Region::from_pairs(&[(0, 4)]), vec![9]);
        assert!(Reflector::new(course_domain(), &objective).build(&info).is_err());
    }
}

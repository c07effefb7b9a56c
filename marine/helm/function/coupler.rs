//! Couples independent preference functions into one joint function.

use tracing::debug;

use super::{region::Region, IvpFunction, PartitionMap};
use crate::error::HelmError;

/// Folds weighted functions into a single function of weight one.
///
/// Each pair of source regions yields one joint region: shared axes take
/// the intersection of both intervals (pairs that do not overlap there are
/// skipped), other axes come from whichever function owns them. The joint
/// polynomial is the weighted sum of both lifted polynomials. Joint regions
/// are ordered by first-function region, then second-function region.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coupler;

impl Coupler {
    /// Creates a coupler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Joint function over the union of both functions' axes. The first
    /// function's axes come first.
    pub fn couple(&self, a: &IvpFunction, b: &IvpFunction) -> Result<IvpFunction, HelmError> {
        let domain = a.domain().union(b.domain())?;
        let dims = domain.size();
        let place_a: Vec<usize> = (0..a.domain().size()).collect();
        let place_b = b
            .axis_names()
            .iter()
            .map(|name| {
                domain
                    .index_of(name)
                    .ok_or_else(|| HelmError::DimensionMismatch(format!("axis `{name}` lost")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut regions = Vec::new();
        for ra in a.map().regions() {
            let lifted_a = ra.poly().lifted(&place_a, dims).scaled(a.weight());
            'pairs: for rb in b.map().regions() {
                let mut bounds = vec![None; dims];
                for (axis, interval) in place_a.iter().zip(ra.bounds()) {
                    bounds[*axis] = Some(*interval);
                }
                for (axis, interval) in place_b.iter().zip(rb.bounds()) {
                    bounds[*axis] = match bounds[*axis] {
                        Some(existing) => match interval.intersect(&existing) {
                            Some(overlap) => Some(overlap),
                            None => continue 'pairs,
                        },
                        None => Some(*interval),
                    };
                }
                let bounds = bounds.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
                    HelmError::DimensionMismatch("joint region missing an axis".into())
                })?;
                let poly = lifted_a.plus(&rb.poly().lifted(&place_b, dims).scaled(b.weight()));
                regions.push(Region::new(bounds).with_poly(poly));
            }
        }

        let degree = a.map().degree().max(b.map().degree());
        let map = PartitionMap::new(domain, regions, degree)?;
        debug!(
            left = a.map().len(),
            right = b.map().len(),
            joint = map.len(),
            "functions coupled"
        );
        let descriptor = match (a.descriptor(), b.descriptor()) {
            ("", other) | (other, "") => other.to_string(),
            (left, right) => format!("{left}+{right}"),
        };
        Ok(IvpFunction::new(map, 1.0).with_descriptor(descriptor))
    }

    /// Couples every function in order. A lone function is scaled by its
    /// weight; an empty slice yields `None`.
    pub fn couple_all(&self, functions: &[IvpFunction]) -> Result<Option<IvpFunction>, HelmError> {
        let Some((first, rest)) = functions.split_first() else {
            return Ok(None);
        };
        let mut joint = IvpFunction::new(first.map().scaled(first.weight()), 1.0)
            .with_descriptor(first.descriptor());
        for next in rest {
            joint = self.couple(&joint, next)?;
        }
        Ok(Some(joint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::DecisionDomain, function::peak::PeakFunction};

    fn domain() -> DecisionDomain {
        DecisionDomain::parse(&["course:0:359:360", "speed:0:5:51"]).unwrap()
    }

    fn course_peak(summit: f64, weight: f64) -> IvpFunction {
        let map = PeakFunction::new(&domain(), "course")
            .unwrap()
            .summit(summit)
            .base_width(90.0)
            .wrap(true)
            .extract()
            .unwrap();
        IvpFunction::new(map, weight).with_descriptor(format!("course@{summit}"))
    }

    fn speed_peak(summit: f64, weight: f64) -> IvpFunction {
        let map = PeakFunction::new(&domain(), "speed")
            .unwrap()
            .summit(summit)
            .base_width(2.0)
            .extract()
            .unwrap();
        IvpFunction::new(map, weight)
    }

    #[test]
    fn disjoint_axes_give_product() {
        let course = course_peak(45.0, 1.0);
        let speed = speed_peak(2.0, 1.0);
        let joint = Coupler::new().couple(&course, &speed).unwrap();
        assert_eq!(joint.axis_names(), vec!["course", "speed"]);
        assert_eq!(joint.map().len(), course.map().len() * speed.map().len());
        assert_eq!(joint.map().covered_volume(), domain().volume());
        assert_eq!(joint.map().argmax().unwrap().point, vec![45, 20]);
        assert_eq!(joint.descriptor(), "course@45");
    }

    #[test]
    fn shared_axis_intersects_and_weights_decide() {
        let a = course_peak(90.0, 50.0);
        let b = course_peak(180.0, 100.0);
        let joint = Coupler::new().couple_all(&[a, b]).unwrap().unwrap();
        assert_eq!(joint.axis_names(), vec!["course"]);
        assert_eq!(joint.map().covered_volume(), 360);
        let best = joint.map().argmax().unwrap();
        assert_eq!(best.point, vec![180]);
        assert!((best.value - 10_000.0).abs() < 1e-6);
        assert!((joint.map().eval(&[90]).unwrap() - 5_000.0).abs() < 1e-6);
        assert_eq!(joint.descriptor(), "course@90+course@180");
    }

    #[test]
    fn coverage_is_associative() {
        let a = course_peak(30.0, 20.0);
        let b = speed_peak(1.0, 40.0);
        let c = course_peak(300.0, 10.0);
        let coupler = Coupler::new();
        let left = coupler
            .couple(&coupler.couple(&a, &b).unwrap(), &c)
            .unwrap();
        let right = coupler
            .couple(&a, &coupler.couple(&b, &c).unwrap())
            .unwrap();
        assert_eq!(left.map().covered_volume(), right.map().covered_volume());
        assert_eq!(left.map().covered_volume(), domain().volume());
        let mut left_axes = left.axis_names();
        let mut right_axes = right.axis_names();
        left_axes.sort_unstable();
        right_axes.sort_unstable();
        assert_eq!(left_axes, right_axes);
        let best_left = left.map().argmax().unwrap().value;
        let best_right = right.map().argmax().unwrap().value;
        assert!((best_left - best_right).abs() < 1e-6);
    }

    #[test]
    fn lone_function_is_scaled_and_empty_is_none() {
        let coupler = Coupler::new();
        assert!(coupler.couple_all(&[]).unwrap().is_none());
        let joint = coupler.couple_all(&[speed_peak(3.0, 7.0)]).unwrap().unwrap();
        assert!((joint.weight() - 1.0).abs() < f64::EPSILON);
        assert!((joint.map().argmax().unwrap().value - 700.0).abs() < 1e-9);
    }

    #[test]
    fn incompatible_shared_axis_is_rejected() {
        let other = DecisionDomain::parse(&["course:0:358:359"]).unwrap();
        let map = PartitionMap::constant(other, 1.0).unwrap();
        let err = Coupler::new()
            .couple(&course_peak(10.0, 1.0), &IvpFunction::new(map, 1.0))
            .unwrap_err();
        assert!(matches!(err, HelmError::DimensionMismatch(_)));
    }
}

//! Piecewise preference functions: partition maps over a decision domain,
//! their construction, refinement and coupling.

/// Combining independent functions into one joint function.
pub mod coupler;
/// Focused re-tiling of a partition map.
pub mod focus;
/// One-dimensional peak preference.
pub mod peak;
/// Refinement order.
pub mod queue;
/// Building partition maps from objective functions.
pub mod reflector;
/// Boxes, intervals and polynomials.
pub mod region;
/// Polynomial fitting.
pub mod regressor;

use serde::Serialize;

use crate::{domain::DecisionDomain, error::HelmError};

use self::region::{tile, Interval, Polynomial, Region};

/// Regions tiling a decision domain, each carrying a polynomial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionMap {
    domain: DecisionDomain,
    regions: Vec<Region>,
    degree: u8,
}

/// Best grid point of a partition map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Optimum {
    /// Index of the winning region.
    pub region: usize,
    /// Grid index per axis of the map's domain.
    pub point: Vec<usize>,
    /// Function value at the point.
    pub value: f64,
}

impl PartitionMap {
    /// Wraps regions, failing unless they tile the domain.
    pub fn new(
        domain: DecisionDomain,
        regions: Vec<Region>,
        degree: u8,
    ) -> Result<Self, HelmError> {
        if degree > 2 {
            return Err(HelmError::invalid("degree", degree.to_string()));
        }
        let map = Self {
            domain,
            regions,
            degree,
        };
        map.check_coverage()?;
        Ok(map)
    }

    /// Uniform tiling with `piece` indices per axis and zero polynomials.
    pub fn uniform(domain: DecisionDomain, piece: &[usize], degree: u8) -> Result<Self, HelmError> {
        if piece.len() != domain.size() {
            return Err(HelmError::DimensionMismatch(format!(
                "piece has {} axes, domain has {}",
                piece.len(),
                domain.size()
            )));
        }
        if piece.contains(&0) {
            return Err(HelmError::invalid("uniform_piece", format!("{piece:?}")));
        }
        let poly = Polynomial::zero(degree, domain.size())?;
        let regions = tile(&full_bounds(&domain), piece)
            .into_iter()
            .map(|region| region.with_poly(poly.clone()))
            .collect();
        Self::new(domain, regions, degree)
    }

    /// One region over the whole domain with a constant value.
    pub fn constant(domain: DecisionDomain, value: f64) -> Result<Self, HelmError> {
        let region =
            Region::new(full_bounds(&domain)).with_poly(Polynomial::constant(value, domain.size()));
        Self::new(domain, vec![region], 0)
    }

    /// Domain the map tiles.
    #[must_use]
    pub const fn domain(&self) -> &DecisionDomain {
        &self.domain
    }

    /// Regions in index order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region at an index.
    #[must_use]
    pub fn region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the map has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Polynomial degree shared by the regions.
    #[must_use]
    pub const fn degree(&self) -> u8 {
        self.degree
    }

    /// Sum of region volumes.
    #[must_use]
    pub fn covered_volume(&self) -> u128 {
        self.regions.iter().map(Region::volume).sum()
    }

    /// Fails unless every region lies in the domain with matching
    /// dimensionality, no two regions overlap and the region volumes add
    /// up to the domain volume.
    pub fn check_coverage(&self) -> Result<(), HelmError> {
        let dims = self.domain.size();
        for (index, region) in self.regions.iter().enumerate() {
            if region.dims() != dims || region.poly().dims() != dims {
                return Err(HelmError::DimensionMismatch(format!(
                    "region {index} has {} axes, domain has {dims}",
                    region.dims()
                )));
            }
            let inside = region
                .bounds()
                .iter()
                .enumerate()
                .all(|(axis, interval)| interval.hi < self.domain.points(axis));
            if !inside {
                return Err(HelmError::Coverage(format!(
                    "region {index} extends past the domain"
                )));
            }
        }
        if let Some((first, second)) = self.first_overlap() {
            return Err(HelmError::Coverage(format!(
                "regions {first} and {second} overlap"
            )));
        }
        let covered = self.covered_volume();
        if covered != self.domain.volume() {
            return Err(HelmError::Coverage(format!(
                "regions cover {covered} of {} points",
                self.domain.volume()
            )));
        }
        Ok(())
    }

    // Sweep along the first axis: only regions whose start falls inside the
    // current one can overlap it.
    fn first_overlap(&self) -> Option<(usize, usize)> {
        let start = |index: usize| self.regions[index].bounds().first().map_or(0, |i| i.lo);
        let end = |index: usize| self.regions[index].bounds().first().map_or(0, |i| i.hi);
        let mut order: Vec<usize> = (0..self.regions.len()).collect();
        order.sort_by_key(|&index| start(index));
        for (rank, &index) in order.iter().enumerate() {
            for &other in &order[rank + 1..] {
                if start(other) > end(index) {
                    break;
                }
                if self.regions[index].intersects(&self.regions[other]) {
                    return Some((index.min(other), index.max(other)));
                }
            }
        }
        None
    }

    /// Value at a grid point, from the first region containing it.
    #[must_use]
    pub fn eval(&self, point: &[usize]) -> Option<f64> {
        self.regions
            .iter()
            .find(|region| region.contains_point(point))
            .map(|region| region.poly().eval(point))
    }

    /// Every region's polynomial multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            domain: self.domain.clone(),
            regions: self
                .regions
                .iter()
                .map(|region| {
                    let poly = region.poly().scaled(factor);
                    region.clone().with_poly(poly)
                })
                .collect(),
            degree: self.degree,
        }
    }

    /// Maximizing grid point. Regions are scanned in index order and only a
    /// strictly greater value replaces the incumbent, so exact ties go to
    /// the lowest region index.
    #[must_use]
    pub fn argmax(&self) -> Option<Optimum> {
        let mut best: Option<Optimum> = None;
        for (index, region) in self.regions.iter().enumerate() {
            let (point, value) = region.max_point();
            if best.as_ref().map_or(true, |incumbent| value > incumbent.value) {
                best = Some(Optimum {
                    region: index,
                    point,
                    value,
                });
            }
        }
        best
    }

    pub(crate) fn regions_mut(&mut self) -> &mut Vec<Region> {
        &mut self.regions
    }

    pub(crate) fn replace_regions(&mut self, regions: Vec<Region>) {
        self.regions = regions;
    }
}

/// Bounds spanning every index of the domain.
#[must_use]
pub fn full_bounds(domain: &DecisionDomain) -> Vec<Interval> {
    (0..domain.size())
        .map(|axis| Interval::new(0, domain.points(axis).saturating_sub(1)))
        .collect()
}

/// A behavior's vote: a partition map plus its priority weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IvpFunction {
    map: PartitionMap,
    weight: f64,
    descriptor: String,
}

impl IvpFunction {
    /// Wraps a map with a weight.
    #[must_use]
    pub fn new(map: PartitionMap, weight: f64) -> Self {
        Self {
            map,
            weight,
            descriptor: String::new(),
        }
    }

    /// Labels the function, usually with the voting behavior's name.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// Underlying partition map.
    #[must_use]
    pub const fn map(&self) -> &PartitionMap {
        &self.map
    }

    /// Priority weight.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Label.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Domain the function is defined over.
    #[must_use]
    pub const fn domain(&self) -> &DecisionDomain {
        self.map.domain()
    }

    /// Names of the axes the function votes on.
    #[must_use]
    pub fn axis_names(&self) -> Vec<&str> {
        self.map.domain().names()
    }
}

//! Boxes over the index grid and their separable polynomials.

use serde::{Deserialize, Serialize};

use crate::error::HelmError;

/// Inclusive index interval on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// First index.
    pub lo: usize,
    /// Last index, inclusive.
    pub hi: usize,
}

impl Interval {
    /// Creates an interval, swapping reversed bounds.
    #[must_use]
    pub const fn new(lo: usize, hi: usize) -> Self {
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    /// Number of indices covered.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.hi - self.lo + 1
    }

    /// Middle index, the lower one on even widths.
    #[must_use]
    pub const fn center(&self) -> usize {
        self.lo + (self.hi - self.lo) / 2
    }

    /// Whether `index` lies inside.
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        self.lo <= index && index <= self.hi
    }

    /// Overlap with another interval.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(Self { lo, hi })
    }
}

/// Polynomial without cross terms over absolute grid indices:
/// `constant + sum(linear[i] * x[i] + quadratic[i] * x[i]^2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    degree: u8,
    constant: f64,
    linear: Vec<f64>,
    quadratic: Vec<f64>,
}

impl Polynomial {
    /// Zero polynomial of the given degree over `dims` axes.
    pub fn zero(degree: u8, dims: usize) -> Result<Self, HelmError> {
        if degree > 2 {
            return Err(HelmError::invalid("degree", degree.to_string()));
        }
        Ok(Self {
            degree,
            constant: 0.0,
            linear: vec![0.0; dims],
            quadratic: vec![0.0; dims],
        })
    }

    /// Constant polynomial.
    #[must_use]
    pub fn constant(value: f64, dims: usize) -> Self {
        Self {
            degree: 0,
            constant: value,
            linear: vec![0.0; dims],
            quadratic: vec![0.0; dims],
        }
    }

    /// Degree, 0 to 2.
    #[must_use]
    pub const fn degree(&self) -> u8 {
        self.degree
    }

    /// Number of axes.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.linear.len()
    }

    /// Constant term.
    #[must_use]
    pub const fn constant_term(&self) -> f64 {
        self.constant
    }

    /// Linear coefficient on an axis.
    #[must_use]
    pub fn linear(&self, axis: usize) -> f64 {
        self.linear.get(axis).copied().unwrap_or(0.0)
    }

    /// Quadratic coefficient on an axis.
    #[must_use]
    pub fn quadratic(&self, axis: usize) -> f64 {
        self.quadratic.get(axis).copied().unwrap_or(0.0)
    }

    /// Sets the constant term.
    pub fn set_constant(&mut self, value: f64) {
        self.constant = value;
    }

    /// Sets the linear coefficient; ignored on degree 0.
    pub fn set_linear(&mut self, axis: usize, value: f64) {
        if self.degree >= 1 {
            if let Some(slot) = self.linear.get_mut(axis) {
                *slot = value;
            }
        }
    }

    /// Sets the quadratic coefficient; ignored below degree 2.
    pub fn set_quadratic(&mut self, axis: usize, value: f64) {
        if self.degree >= 2 {
            if let Some(slot) = self.quadratic.get_mut(axis) {
                *slot = value;
            }
        }
    }

    fn axis_term(&self, axis: usize, x: f64) -> f64 {
        self.quadratic[axis].mul_add(x * x, self.linear[axis] * x)
    }

    /// Value at a grid point.
    #[must_use]
    pub fn eval(&self, point: &[usize]) -> f64 {
        point
            .iter()
            .enumerate()
            .take(self.dims())
            .fold(self.constant, |acc, (axis, &x)| {
                #[allow(clippy::cast_precision_loss)]
                let x = x as f64;
                acc + self.axis_term(axis, x)
            })
    }

    /// Polynomial multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            degree: self.degree,
            constant: self.constant * factor,
            linear: self.linear.iter().map(|c| c * factor).collect(),
            quadratic: self.quadratic.iter().map(|c| c * factor).collect(),
        }
    }

    /// Re-expresses the polynomial over `dims` axes; axis `i` moves to
    /// `placement[i]`.
    #[must_use]
    pub fn lifted(&self, placement: &[usize], dims: usize) -> Self {
        let mut linear = vec![0.0; dims];
        let mut quadratic = vec![0.0; dims];
        for (axis, &target) in placement.iter().enumerate() {
            linear[target] = self.linear(axis);
            quadratic[target] = self.quadratic(axis);
        }
        Self {
            degree: self.degree,
            constant: self.constant,
            linear,
            quadratic,
        }
    }

    /// Sum of two polynomials over the same axes.
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        Self {
            degree: self.degree.max(other.degree),
            constant: self.constant + other.constant,
            linear: self
                .linear
                .iter()
                .zip(&other.linear)
                .map(|(a, b)| a + b)
                .collect(),
            quadratic: self
                .quadratic
                .iter()
                .zip(&other.quadratic)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    /// Best index on one axis inside `interval`. Candidates are the center,
    /// the ends, then the vertex neighbours; the first strict improvement
    /// wins, so a flat axis resolves to the center.
    #[must_use]
    pub fn axis_argmax(&self, axis: usize, interval: Interval) -> usize {
        let mut candidates = vec![interval.center(), interval.lo, interval.hi];
        let a = self.quadratic(axis);
        if a < 0.0 {
            let vertex = -self.linear(axis) / (2.0 * a);
            #[allow(clippy::cast_precision_loss)]
            let (lo, hi) = (interval.lo as f64, interval.hi as f64);
            if vertex > lo && vertex < hi {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let floor = vertex.floor() as usize;
                candidates.push(floor);
                candidates.push((floor + 1).min(interval.hi));
            }
        }
        let mut best = candidates[0];
        #[allow(clippy::cast_precision_loss)]
        let mut best_value = self.axis_term(axis, best as f64);
        for &candidate in &candidates[1..] {
            #[allow(clippy::cast_precision_loss)]
            let value = self.axis_term(axis, candidate as f64);
            if value > best_value {
                best = candidate;
                best_value = value;
            }
        }
        best
    }
}

/// Hyperrectangle of grid indices carrying a polynomial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    bounds: Vec<Interval>,
    poly: Polynomial,
}

impl Region {
    /// Region with a zero constant polynomial.
    #[must_use]
    pub fn new(bounds: Vec<Interval>) -> Self {
        let dims = bounds.len();
        Self {
            bounds,
            poly: Polynomial::constant(0.0, dims),
        }
    }

    /// Region from `(lo, hi)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(usize, usize)]) -> Self {
        Self::new(pairs.iter().map(|&(lo, hi)| Interval::new(lo, hi)).collect())
    }

    /// Replaces the polynomial.
    #[must_use]
    pub fn with_poly(mut self, poly: Polynomial) -> Self {
        self.poly = poly;
        self
    }

    /// Number of axes.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.bounds.len()
    }

    /// Per-axis intervals.
    #[must_use]
    pub fn bounds(&self) -> &[Interval] {
        &self.bounds
    }

    /// The region's polynomial.
    #[must_use]
    pub const fn poly(&self) -> &Polynomial {
        &self.poly
    }

    /// Replaces the polynomial in place.
    pub fn set_poly(&mut self, poly: Polynomial) {
        self.poly = poly;
    }

    /// Number of grid points covered.
    #[must_use]
    pub fn volume(&self) -> u128 {
        self.bounds
            .iter()
            .map(|interval| interval.width() as u128)
            .product()
    }

    /// Center grid point.
    #[must_use]
    pub fn center(&self) -> Vec<usize> {
        self.bounds.iter().map(Interval::center).collect()
    }

    /// Whether the grid point lies inside.
    #[must_use]
    pub fn contains_point(&self, point: &[usize]) -> bool {
        point.len() == self.dims()
            && self
                .bounds
                .iter()
                .zip(point)
                .all(|(interval, &x)| interval.contains(x))
    }

    /// Whether `other` lies entirely inside this region.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.dims() == other.dims()
            && self
                .bounds
                .iter()
                .zip(&other.bounds)
                .all(|(outer, inner)| outer.lo <= inner.lo && inner.hi <= outer.hi)
    }

    /// Bounds of the overlap with `other`, if any.
    #[must_use]
    pub fn intersect_bounds(&self, other: &Self) -> Option<Vec<Interval>> {
        if self.dims() != other.dims() {
            return None;
        }
        self.bounds
            .iter()
            .zip(&other.bounds)
            .map(|(a, b)| a.intersect(b))
            .collect()
    }

    /// Whether the two regions share a grid point.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersect_bounds(other).is_some()
    }

    /// Pieces of this region outside `cut`, each keeping this region's
    /// polynomial. Disjoint inputs return the region unchanged.
    #[must_use]
    pub fn subtract(&self, cut: &Self) -> Vec<Self> {
        let Some(overlap) = self.intersect_bounds(cut) else {
            return vec![self.clone()];
        };
        let mut pieces = Vec::new();
        let mut rest = self.bounds.clone();
        for (axis, inner) in overlap.iter().enumerate() {
            let outer = rest[axis];
            if outer.lo < inner.lo {
                let mut bounds = rest.clone();
                bounds[axis] = Interval::new(outer.lo, inner.lo - 1);
                pieces.push(Self::new(bounds).with_poly(self.poly.clone()));
            }
            if inner.hi < outer.hi {
                let mut bounds = rest.clone();
                bounds[axis] = Interval::new(inner.hi + 1, outer.hi);
                pieces.push(Self::new(bounds).with_poly(self.poly.clone()));
            }
            rest[axis] = *inner;
        }
        pieces
    }

    /// Splits at the middle of `axis`; `None` when the axis has width one.
    #[must_use]
    pub fn split(&self, axis: usize) -> Option<(Self, Self)> {
        let interval = *self.bounds.get(axis)?;
        if interval.width() < 2 {
            return None;
        }
        let mid = interval.center();
        let mut low = self.clone();
        let mut high = self.clone();
        low.bounds[axis] = Interval::new(interval.lo, mid);
        high.bounds[axis] = Interval::new(mid + 1, interval.hi);
        Some((low, high))
    }

    /// Axis with the most indices; the first wins ties.
    #[must_use]
    pub fn longest_axis(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (axis, interval) in self.bounds.iter().enumerate() {
            if best.map_or(true, |(_, width)| interval.width() > width) {
                best = Some((axis, interval.width()));
            }
        }
        best.map(|(axis, _)| axis)
    }

    /// Grid point maximizing the polynomial inside the region, and its value.
    #[must_use]
    pub fn max_point(&self) -> (Vec<usize>, f64) {
        let point: Vec<usize> = self
            .bounds
            .iter()
            .enumerate()
            .map(|(axis, &interval)| self.poly.axis_argmax(axis, interval))
            .collect();
        let value = self.poly.eval(&point);
        (point, value)
    }
}

/// Tiles `bounds` with cells of `piece` indices per axis; the last cell on
/// an axis takes whatever remains.
#[must_use]
pub fn tile(bounds: &[Interval], piece: &[usize]) -> Vec<Region> {
    let per_axis: Vec<Vec<Interval>> = bounds
        .iter()
        .zip(piece)
        .map(|(interval, &step)| {
            let step = step.max(1);
            let mut cells = Vec::new();
            let mut lo = interval.lo;
            while lo <= interval.hi {
                let hi = (lo + step - 1).min(interval.hi);
                cells.push(Interval::new(lo, hi));
                lo = hi + 1;
            }
            cells
        })
        .collect();

    let mut regions = vec![Vec::with_capacity(bounds.len())];
    for cells in per_axis {
        regions = regions
            .into_iter()
            .flat_map(|prefix: Vec<Interval>| {
                cells.iter().map(move |cell| {
                    let mut bounds = prefix.clone();
                    bounds.push(*cell);
                    bounds
                })
            })
            .collect();
    }
    regions.into_iter().map(Region::new).collect()
}

//! Discretized decision space the behaviors vote over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HelmError;

/// One named, discretized axis of the decision space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAxis {
    /// Axis name, e.g. `course`.
    pub name: String,
    /// Value at index zero.
    pub low: f64,
    /// Value at the last index.
    pub high: f64,
    /// Number of grid points, at least one.
    pub points: usize,
    /// Whether a complete decision must include this axis.
    pub mandatory: bool,
}

impl DomainAxis {
    /// Grid step between neighbouring points.
    #[must_use]
    pub fn delta(&self) -> f64 {
        if self.points <= 1 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let steps = (self.points - 1) as f64;
        (self.high - self.low) / steps
    }

    /// Value of the given grid index.
    #[must_use]
    pub fn value_at(&self, index: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let index = index.min(self.points - 1) as f64;
        index.mul_add(self.delta(), self.low)
    }

    /// Nearest grid index to `value`, clamped to the axis.
    #[must_use]
    pub fn discretize(&self, value: f64) -> usize {
        let delta = self.delta();
        if delta <= 0.0 || value <= self.low {
            return 0;
        }
        if value >= self.high {
            return self.points - 1;
        }
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let index = ((value - self.low) / delta).round() as usize;
        index.min(self.points - 1)
    }

    fn compatible(&self, other: &Self) -> bool {
        self.name == other.name
            && self.points == other.points
            && (self.low - other.low).abs() < f64::EPSILON
            && (self.high - other.high).abs() < f64::EPSILON
    }
}

/// Ordered list of axes. The order fixes the axis index used by every
/// region and partition map built over this domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionDomain {
    axes: Vec<DomainAxis>,
}

impl DecisionDomain {
    /// Creates an empty domain.
    #[must_use]
    pub const fn new() -> Self {
        Self { axes: Vec::new() }
    }

    /// Appends a mandatory axis.
    pub fn add_axis(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        points: usize,
    ) -> Result<(), HelmError> {
        self.push_axis(name, low, high, points, true)
    }

    /// Appends an axis that a complete decision may omit.
    pub fn add_optional_axis(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        points: usize,
    ) -> Result<(), HelmError> {
        self.push_axis(name, low, high, points, false)
    }

    fn push_axis(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        points: usize,
        mandatory: bool,
    ) -> Result<(), HelmError> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(HelmError::Domain(format!("bad axis name `{name}`")));
        }
        if self.index_of(name).is_some() {
            return Err(HelmError::Domain(format!("duplicate axis `{name}`")));
        }
        if points == 0 {
            return Err(HelmError::Domain(format!("axis `{name}` has no points")));
        }
        if !low.is_finite() || !high.is_finite() || high < low || (points > 1 && high <= low) {
            return Err(HelmError::Domain(format!(
                "axis `{name}` has bad bounds {low}..{high}"
            )));
        }
        self.axes.push(DomainAxis {
            name: name.to_string(),
            low,
            high,
            points,
            mandatory,
        });
        Ok(())
    }

    /// Parses and appends one `name:low:high:count[:optional]` entry. Commas
    /// are accepted in place of colons.
    pub fn add_entry(&mut self, entry: &str) -> Result<(), HelmError> {
        let normalized = entry.trim().replace(',', ":");
        let fields: Vec<&str> = normalized.split(':').map(str::trim).collect();
        if fields.len() != 4 && fields.len() != 5 {
            return Err(HelmError::Domain(format!("bad entry `{entry}`")));
        }
        let bad = || HelmError::Domain(format!("bad entry `{entry}`"));
        let low: f64 = fields[1].parse().map_err(|_| bad())?;
        let high: f64 = fields[2].parse().map_err(|_| bad())?;
        let points: usize = fields[3].parse().map_err(|_| bad())?;
        let mandatory = match fields.get(4).map(|flag| flag.to_ascii_lowercase()) {
            None => true,
            Some(flag) if flag == "optional" => false,
            Some(flag) if flag == "mandatory" => true,
            Some(_) => return Err(bad()),
        };
        self.push_axis(fields[0], low, high, points, mandatory)
    }

    /// Builds a domain from several entries, all or nothing.
    pub fn parse(entries: &[impl AsRef<str>]) -> Result<Self, HelmError> {
        let mut domain = Self::new();
        for entry in entries {
            domain.add_entry(entry.as_ref())?;
        }
        Ok(domain)
    }

    /// Number of axes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.axes.len()
    }

    /// Whether the domain has no axes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Axes in order.
    #[must_use]
    pub fn axes(&self) -> &[DomainAxis] {
        &self.axes
    }

    /// Axis at an index.
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<&DomainAxis> {
        self.axes.get(index)
    }

    /// Index of the named axis.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|axis| axis.name == name)
    }

    /// Axis names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.axes.iter().map(|axis| axis.name.as_str()).collect()
    }

    /// Grid points on an axis (zero for a bad index).
    #[must_use]
    pub fn points(&self, index: usize) -> usize {
        self.axes.get(index).map_or(0, |axis| axis.points)
    }

    /// Total number of grid points in the domain.
    #[must_use]
    pub fn volume(&self) -> u128 {
        self.axes.iter().map(|axis| axis.points as u128).product()
    }

    /// Domain restricted to the named axes, in this domain's order. Fails
    /// when a name is unknown.
    pub fn sub_domain(&self, names: &[&str]) -> Result<Self, HelmError> {
        if let Some(missing) = names.iter().find(|name| self.index_of(name).is_none()) {
            return Err(HelmError::Domain(format!("no axis `{missing}`")));
        }
        Ok(Self {
            axes: self
                .axes
                .iter()
                .filter(|axis| names.contains(&axis.name.as_str()))
                .cloned()
                .collect(),
        })
    }

    /// Union of two domains: this domain's axes followed by the other's
    /// new axes. Shared axes must have identical bounds and resolution.
    pub fn union(&self, other: &Self) -> Result<Self, HelmError> {
        let mut axes = self.axes.clone();
        for axis in &other.axes {
            match self.axes.iter().find(|own| own.name == axis.name) {
                Some(own) if own.compatible(axis) => {}
                Some(_) => {
                    return Err(HelmError::DimensionMismatch(format!(
                        "axis `{}` differs between functions",
                        axis.name
                    )))
                }
                None => axes.push(axis.clone()),
            }
        }
        Ok(Self { axes })
    }
}

impl fmt::Display for DecisionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .axes
            .iter()
            .map(|axis| format!("{}:{}:{}:{}", axis.name, axis.low, axis.high, axis.points))
            .collect();
        write!(f, "{}", entries.join(","))
    }
}

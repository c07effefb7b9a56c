//! Compass geometry: headings in degrees, 0 along +y, clockwise.

use crate::error::HelmError;

/// Normalizes an angle to `[0, 360)`.
#[must_use]
pub fn angle360(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Heading from the first point toward the second.
#[must_use]
pub fn bearing(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return 0.0;
    }
    angle360(dx.atan2(dy).to_degrees())
}

/// Straight-line distance.
#[must_use]
pub fn distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    (to.0 - from.0).hypot(to.1 - from.1)
}

/// Smallest absolute difference between two headings, `[0, 180]`.
#[must_use]
pub fn heading_gap(a: f64, b: f64) -> f64 {
    let gap = angle360(a - b);
    gap.min(360.0 - gap)
}

/// Parses `x,y`.
pub fn parse_point(key: &str, text: &str) -> Result<(f64, f64), HelmError> {
    let bad = || HelmError::invalid(key, text);
    let (x, y) = text.split_once(',').ok_or_else(bad)?;
    let x: f64 = x.trim().parse().map_err(|_| bad())?;
    let y: f64 = y.trim().parse().map_err(|_| bad())?;
    if !x.is_finite() || !y.is_finite() {
        return Err(bad());
    }
    Ok((x, y))
}

/// Parses `x,y:x,y:...`, optionally wrapped in braces.
pub fn parse_points(key: &str, text: &str) -> Result<Vec<(f64, f64)>, HelmError> {
    let inner = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();
    if inner.is_empty() {
        return Err(HelmError::invalid(key, text));
    }
    inner
        .split(':')
        .map(|point| parse_point(key, point).map_err(|_| HelmError::invalid(key, text)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearings_are_compass_style() {
        assert!(bearing((0.0, 0.0), (0.0, 10.0)).abs() < 1e-9);
        assert!((bearing((0.0, 0.0), (10.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((bearing((0.0, 0.0), (0.0, -10.0)) - 180.0).abs() < 1e-9);
        assert!((bearing((5.0, 5.0), (0.0, 5.0)) - 270.0).abs() < 1e-9);
        assert!((distance((0.0, 0.0), (3.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn angles_wrap() {
        assert!((angle360(-90.0) - 270.0).abs() < 1e-12);
        assert!((angle360(725.0) - 5.0).abs() < 1e-12);
        assert!((heading_gap(350.0, 10.0) - 20.0).abs() < 1e-12);
        assert!((heading_gap(90.0, 270.0) - 180.0).abs() < 1e-12);
    }

    #[test]
    fn point_lists() {
        assert_eq!(
            parse_points("points", "{0,0 : 10, -5}").unwrap(),
            vec![(0.0, 0.0), (10.0, -5.0)]
        );
        assert!(parse_points("points", "0,0:10").is_err());
        assert!(parse_points("points", "{}").is_err());
        assert!(parse_point("station", "1;2").is_err());
    }
}

//! Grid directions and phase helpers.
//!
//! Screen convention: +x is east, +y is south. A positive angular velocity
//! turns clockwise on screen.

use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Relative tolerance used when comparing propagated ratios.
pub const EPSILON: f64 = 1e-6;

/// A cardinal direction on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit tile step in this direction.
    pub fn delta(self) -> IVec2 {
        match self {
            Direction::North => IVec2::new(0, -1),
            Direction::East => IVec2::new(1, 0),
            Direction::South => IVec2::new(0, 1),
            Direction::West => IVec2::new(-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// True for east/west.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    /// Direction of a unit axis step, if `delta` is one.
    pub fn from_delta(delta: IVec2) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.delta() == delta)
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if a >= TAU { 0.0 } else { a }
}

/// Wrap a belt phase into `[0, 1)`.
pub fn wrap_unit(offset: f64) -> f64 {
    let o = offset.rem_euclid(1.0);
    if o >= 1.0 { 0.0 } else { o }
}

/// Relative float comparison with an absolute floor of `EPSILON`.
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= EPSILON * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn direction_deltas_are_unit_steps() {
        for d in Direction::ALL {
            let v = d.delta();
            assert_eq!(v.x.abs() + v.y.abs(), 1);
            assert_eq!(d.opposite().delta(), -v);
            assert_eq!(Direction::from_delta(v), Some(d));
        }
        assert_eq!(Direction::from_delta(IVec2::new(1, 1)), None);
    }

    #[test]
    fn normalize_angle_wraps_both_ways() {
        assert!(approx_eq(normalize_angle(3.0 * PI), PI));
        assert!(approx_eq(normalize_angle(-PI / 2.0), 1.5 * PI));
        assert_eq!(normalize_angle(0.0), 0.0);
        let tiny = normalize_angle(-1e-18);
        assert!((0.0..TAU).contains(&tiny));
    }

    #[test]
    fn wrap_unit_stays_in_range() {
        assert!(approx_eq(wrap_unit(1.25), 0.25));
        assert!(approx_eq(wrap_unit(-0.25), 0.75));
        assert!((0.0..1.0).contains(&wrap_unit(-1e-18)));
    }

    #[test]
    fn approx_eq_is_relative() {
        assert!(approx_eq(1000.0, 1000.0 + 1e-4));
        assert!(!approx_eq(1.0, 1.001));
        assert!(approx_eq(0.0, 1e-9));
    }
}

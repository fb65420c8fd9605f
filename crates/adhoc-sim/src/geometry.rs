//! Node positions.

use meshbench_core::units::Meters;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A point in the plane, in meters.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Places `n` nodes uniformly at random in the square `[0, area]^2`.
pub fn place_uniform(n: usize, area: Meters, seed: u64) -> Vec<Position> {
    let mut rng = StdRng::seed_from_u64(seed);
    let side = area.into_f64();
    (0..n)
        .map(|_| {
            // Draw x before y so that node i's position only depends on draws 2i and 2i+1.
            let x = rng.gen::<f64>() * side;
            let y = rng.gen::<f64>() * side;
            Position::new(x, y)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_stay_inside_the_area() {
        let positions = place_uniform(500, Meters::new(1000), 3);
        assert_eq!(positions.len(), 500);
        for p in positions {
            assert!((0.0..=1000.0).contains(&p.x));
            assert!((0.0..=1000.0).contains(&p.y));
        }
    }

    #[test]
    fn placement_is_seeded() {
        let a = place_uniform(10, Meters::new(1000), 42);
        let b = place_uniform(10, Meters::new(1000), 42);
        let c = place_uniform(10, Meters::new(1000), 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_area_collapses_to_the_origin() {
        let positions = place_uniform(3, Meters::ZERO, 0);
        assert!(positions.iter().all(|&p| p == Position::default()));
    }

    #[test]
    fn pythagoras() {
        assert_eq!(Position::new(0.0, 0.0).distance(&Position::new(3.0, 4.0)), 5.0);
    }
}

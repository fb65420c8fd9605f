use meshbench_core::units::Dbm;

use crate::{
    geometry::Position,
    propagation::{Friis, DEFAULT_ENERGY_DETECTION_THRESHOLD},
    topology::Topology,
};

/// `n` nodes on the x axis, `spacing` meters apart.
pub(crate) fn line(spacing: f64, n: usize) -> Vec<Position> {
    (0..n)
        .map(|i| Position::new(i as f64 * spacing, 0.0))
        .collect()
}

/// The topology of `positions` at 0 dBm, where nodes hear each other up to about 624 m.
pub(crate) fn topology(positions: &[Position]) -> Topology {
    Topology::new(
        positions,
        &Friis::default(),
        Dbm::new(0.0),
        DEFAULT_ENERGY_DETECTION_THRESHOLD,
    )
    .unwrap()
}

/// A chain of `n` nodes 400 m apart: every node only hears its immediate neighbors.
pub(crate) fn chain(n: usize) -> Topology {
    topology(&line(400.0, n))
}

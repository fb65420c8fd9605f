use meshbench_core::{engine::NodeId, units::Dbm};
use petgraph::graph::{NodeIndex, UnGraph};

use crate::{geometry::Position, propagation::Friis};

/// A wireless link between two nodes in range of each other.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    /// Distance between the endpoints, in meters.
    pub distance: f64,
    /// Signal strength at either end.
    pub rx_power: Dbm,
}

/// The connectivity graph: one graph node per simulated node, one edge per pair of nodes that
/// can hear each other.
#[derive(Debug)]
pub struct Topology {
    pub(crate) graph: UnGraph<NodeId, Link>,
}

impl Topology {
    /// Creates a topology from node positions. Node `i` is at `positions[i]`. All nodes
    /// transmit at `tx_power`, and a pair is connected when the received power reaches
    /// `threshold`. This function returns an error if the positions are not usable.
    ///
    /// Correctness properties:
    ///
    /// - Every position must be finite.
    /// - Links are symmetric, since all nodes use the same power and gains.
    pub fn new(
        positions: &[Position],
        friis: &Friis,
        tx_power: Dbm,
        threshold: Dbm,
    ) -> Result<Self, TopologyError> {
        let mut g = UnGraph::with_capacity(positions.len(), 0);
        for (i, p) in positions.iter().enumerate() {
            // CORRECTNESS: Every position must be finite.
            if !p.is_finite() {
                return Err(TopologyError::InvalidPosition(NodeId::new(i), *p));
            }
            g.add_node(NodeId::new(i));
        }
        for (i, pi) in positions.iter().enumerate() {
            for (j, pj) in positions.iter().enumerate().skip(i + 1) {
                let distance = pi.distance(pj);
                let rx_power = friis.rx_power(tx_power, distance);
                if rx_power >= threshold {
                    let link = Link {
                        a: NodeId::new(i),
                        b: NodeId::new(j),
                        distance,
                        rx_power,
                    };
                    g.add_edge(NodeIndex::new(i), NodeIndex::new(j), link);
                }
            }
        }
        Ok(Self { graph: g })
    }

    pub fn nr_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.graph.edge_weights()
    }

    /// The nodes in range of `id`, in increasing ID order.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        if id.inner() >= self.nr_nodes() {
            return Vec::new();
        }
        let mut neighbors = self
            .graph
            .neighbors(NodeIndex::new(id.inner()))
            .map(|idx| self.graph[idx])
            .collect::<Vec<_>>();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        if a.inner() >= self.nr_nodes() || b.inner() >= self.nr_nodes() {
            return None;
        }
        self.graph
            .find_edge(NodeIndex::new(a.inner()), NodeIndex::new(b.inner()))
            .map(|e| &self.graph[e])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Node {0} has an invalid position {1:?}")]
    InvalidPosition(NodeId, Position),
}

use std::collections::VecDeque;

use meshbench_core::engine::NodeId;
use petgraph::visit::{VisitMap, Visitable};

use crate::topology::Topology;

/// Shortest-path routes between every pair of nodes, by hop count.
///
/// Among next hops of equal cost the one with the lowest ID wins, so routes are deterministic.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Routes {
    next: Vec<Vec<Option<NodeId>>>,
    hops: Vec<Vec<Option<u32>>>,
}

impl Routes {
    /// Builds a routing table from a topology using BFS.
    pub fn new(topology: &Topology) -> Self {
        let g = &topology.graph;
        let n = g.node_count();
        let mut next = vec![vec![None; n]; n];
        let mut hops = vec![vec![None; n]; n];
        // Links are symmetric, so a BFS from `dst` finds every node's distance to `dst`. A node
        // discovered from `cur` at the next level can reach `dst` through `cur`.
        for dst in g.node_indices() {
            let mut discovered = g.visit_map();
            discovered.visit(dst);

            let mut queue = VecDeque::new();
            queue.push_back((dst, 0));

            let mut distances = vec![None; n];
            distances[dst.index()] = Some(0);
            hops[dst.index()][dst.index()] = Some(0);

            while let Some((cur, cur_distance)) = queue.pop_front() {
                for succ in g.neighbors(cur) {
                    if discovered.visit(succ) {
                        distances[succ.index()] = Some(cur_distance + 1);
                        hops[succ.index()][dst.index()] = Some(cur_distance + 1);
                        queue.push_back((succ, cur_distance + 1));
                    }
                    if distances[succ.index()] == Some(cur_distance + 1) {
                        let hop = &mut next[succ.index()][dst.index()];
                        *hop = Some(match *hop {
                            Some(existing) => std::cmp::min(existing, g[cur]),
                            None => g[cur],
                        });
                    }
                }
            }
        }
        Self { next, hops }
    }

    /// The neighbor `from` forwards to in order to reach `to`, or `None` if `to` is
    /// unreachable or equal to `from`.
    pub fn next_hop(&self, from: NodeId, to: NodeId) -> Option<NodeId> {
        *self.next.get(from.inner())?.get(to.inner())?
    }

    /// The number of hops from `from` to `to`, or `None` if `to` is unreachable.
    pub fn hop_count(&self, from: NodeId, to: NodeId) -> Option<u32> {
        *self.hops.get(from.inner())?.get(to.inner())?
    }

    /// The full path from `from` to `to`, both included.
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let len = self.hop_count(from, to)?;
        let mut path = Vec::with_capacity(len as usize + 1);
        path.push(from);
        let mut cur = from;
        while cur != to {
            cur = self.next_hop(cur, to)?;
            path.push(cur);
        }
        Some(path)
    }
}

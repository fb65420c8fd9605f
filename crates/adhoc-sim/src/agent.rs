//! Route availability under each routing protocol.
//!
//! Protocols are not simulated message by message. Each one is reduced to when a node may use
//! the shortest path that [`Routes`] already knows about:
//!
//! - AODV discovers routes on demand. A source buffers packets for a destination until a
//!   request/reply round trip along the path completes. Discovery towards an unreachable
//!   destination times out, is retried and finally drops the buffered packets.
//! - OLSR computes routes proactively. One-hop routes appear after the first HELLO exchange,
//!   longer ones after neighbor sensing has converged and topology control has flooded.
//!   Packets without a route are dropped.
//! - Without a routing protocol every destination is treated as on-link.
//!
//! Control traffic does not occupy the channel.

use meshbench_core::{
    engine::NodeId,
    scenario::RouteProtocol,
    units::{Bytes, Nanosecs},
};
use rustc_hash::FxHashMap;

use crate::{
    mac::Airtime, routing::Routes, simulation::Packet, stats::DropReason, topology::Topology,
};

pub const HELLO_INTERVAL: Nanosecs = Nanosecs::from_secs(2);

/// How long an AODV source waits for a route reply before retrying.
pub const NET_TRAVERSAL_TIME: Nanosecs = Nanosecs::from_millis(2_800);

pub const RREQ_RETRIES: u32 = 2;

pub const RREQ_SIZE: Bytes = Bytes::new(24);
pub const RREP_SIZE: Bytes = Bytes::new(20);

/// What to do with a packet at a node.
#[derive(Debug)]
pub(crate) enum Action {
    /// Hand the packet to the MAC for `next_hop`.
    Forward(Packet, NodeId),
    /// The packet joined a pending discovery.
    Buffered,
    /// The packet started a discovery towards `dst` and was buffered.
    Discover { dst: NodeId },
    Drop(DropReason),
}

/// The outcome of one AODV discovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    /// A route reply arrives after this long.
    Found(Nanosecs),
    /// No reply; the attempt times out after this long.
    TimedOut(Nanosecs),
}

/// The outcome of a discovery timeout.
#[derive(Debug)]
pub(crate) enum Timeout {
    /// Try again; this is attempt number `.0`.
    Retry(u32),
    /// Give up on these packets.
    Failed(Vec<Packet>),
}

#[derive(Debug)]
enum Discovery {
    Pending { attempt: u32, buffer: Vec<Packet> },
    Established,
}

/// The routing agents of all nodes.
#[derive(Debug)]
pub(crate) struct Agent {
    protocol: Option<RouteProtocol>,
    buffer_capacity: usize,
    discoveries: FxHashMap<(NodeId, NodeId), Discovery>,
}

impl Agent {
    pub(crate) fn new(protocol: Option<RouteProtocol>, buffer_capacity: usize) -> Self {
        Self {
            protocol,
            buffer_capacity,
            discoveries: FxHashMap::default(),
        }
    }

    /// Decides what `node` does with `packet` at time `now`.
    pub(crate) fn route(
        &mut self,
        node: NodeId,
        packet: Packet,
        now: Nanosecs,
        topology: &Topology,
        routes: &Routes,
    ) -> Action {
        let dst = packet.dst;
        match self.protocol {
            None => match topology.link(node, dst) {
                Some(_) => Action::Forward(packet, dst),
                None => Action::Drop(DropReason::NoRoute),
            },
            Some(RouteProtocol::Olsr) => {
                let usable = match routes.hop_count(node, dst) {
                    Some(1) => now >= HELLO_INTERVAL,
                    Some(_) => now >= HELLO_INTERVAL.saturating_mul(2),
                    None => false,
                };
                match routes.next_hop(node, dst) {
                    Some(next) if usable => Action::Forward(packet, next),
                    _ => Action::Drop(DropReason::NoRoute),
                }
            }
            // Discovery sets up the route at every node on the path, so only sources wait.
            Some(RouteProtocol::Aodv) if node != packet.src => match routes.next_hop(node, dst) {
                Some(next) => Action::Forward(packet, next),
                None => Action::Drop(DropReason::NoRoute),
            },
            Some(RouteProtocol::Aodv) => match self.discoveries.get_mut(&(node, dst)) {
                Some(Discovery::Established) => match routes.next_hop(node, dst) {
                    Some(next) => Action::Forward(packet, next),
                    None => Action::Drop(DropReason::NoRoute),
                },
                Some(Discovery::Pending { buffer, .. }) => {
                    if buffer.len() >= self.buffer_capacity {
                        return Action::Drop(DropReason::BufferOverflow);
                    }
                    buffer.push(packet);
                    Action::Buffered
                }
                None => {
                    if self.buffer_capacity == 0 {
                        return Action::Drop(DropReason::BufferOverflow);
                    }
                    let pending = Discovery::Pending {
                        attempt: 0,
                        buffer: vec![packet],
                    };
                    self.discoveries.insert((node, dst), pending);
                    Action::Discover { dst }
                }
            },
        }
    }

    /// How discovery attempt number `attempt` from `node` towards `dst` ends.
    ///
    /// A request floods hop by hop as broadcasts and the reply comes back as unicasts, each
    /// hop costing a mean channel access plus the frame. Unanswered attempts wait twice as
    /// long each time.
    pub(crate) fn attempt(
        &self,
        node: NodeId,
        dst: NodeId,
        attempt: u32,
        routes: &Routes,
        airtime: &Airtime,
    ) -> Attempt {
        match routes.hop_count(node, dst) {
            Some(hops) => {
                let request = airtime.mean_access() + airtime.broadcast(RREQ_SIZE);
                let reply = airtime.mean_access() + airtime.unicast(RREP_SIZE);
                Attempt::Found((request + reply).saturating_mul(u64::from(hops)))
            }
            None => Attempt::TimedOut(NET_TRAVERSAL_TIME.saturating_mul(1 << attempt.min(16))),
        }
    }

    /// Marks the route from `node` to `dst` as established and releases the packets that
    /// were waiting for it.
    pub(crate) fn found(&mut self, node: NodeId, dst: NodeId) -> Vec<Packet> {
        match self.discoveries.insert((node, dst), Discovery::Established) {
            Some(Discovery::Pending { buffer, .. }) => buffer,
            _ => Vec::new(),
        }
    }

    /// Handles an unanswered attempt from `node` to `dst`.
    pub(crate) fn timed_out(&mut self, node: NodeId, dst: NodeId) -> Timeout {
        match self.discoveries.get_mut(&(node, dst)) {
            Some(Discovery::Pending { attempt, .. }) if *attempt < RREQ_RETRIES => {
                *attempt += 1;
                Timeout::Retry(*attempt)
            }
            Some(Discovery::Pending { .. }) => match self.discoveries.remove(&(node, dst)) {
                Some(Discovery::Pending { buffer, .. }) => Timeout::Failed(buffer),
                _ => Timeout::Failed(Vec::new()),
            },
            _ => Timeout::Failed(Vec::new()),
        }
    }

    /// Packets waiting for a route.
    pub(crate) fn nr_buffered(&self) -> usize {
        self.discoveries
            .values()
            .map(|d| match d {
                Discovery::Pending { buffer, .. } => buffer.len(),
                Discovery::Established => 0,
            })
            .sum()
    }
}

use std::collections::VecDeque;

use log::debug;
use meshbench_core::{
    accounting::TxObserver,
    engine::NodeId,
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Nanosecs},
};
use rand::rngs::StdRng;

use crate::{
    agent::{Action, Agent, Attempt, Timeout},
    event::EventQueue,
    mac::{self, Airtime, Medium},
    propagation,
    routing::Routes,
    stats::{DropReason, Stats},
    topology::Topology,
};

/// Packets are dropped after this many hops.
pub const MAX_HOPS: u8 = 64;

/// An application packet on its way from a flow's source to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Packet {
    /// Index of the flow in the simulation.
    pub(crate) flow: usize,
    pub(crate) id: FlowId,
    pub(crate) src: NodeId,
    pub(crate) dst: NodeId,
    pub(crate) size: Bytes,
    pub(crate) hops: u8,
}

#[derive(Debug)]
enum Event {
    /// A source emits its next packet.
    Send { flow: usize },
    /// A node with queued packets tries to access the channel.
    Access { node: usize },
    /// A node finished its exchange and may send again.
    TxDone { node: usize },
    /// A packet reached the next hop.
    Arrive { node: usize, packet: Packet },
    /// An AODV route reply reached the source.
    RouteFound { node: NodeId, dst: NodeId },
    /// An AODV route request went unanswered.
    DiscoveryTimeout { node: NodeId, dst: NodeId },
}

#[derive(Debug, Default)]
struct Node {
    queue: VecDeque<(Packet, NodeId)>,
    /// An `Access` or `TxDone` event is pending for this node.
    busy: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FlowCounters {
    pub(crate) tx_packets: u64,
    pub(crate) tx_bytes: Bytes,
    pub(crate) rx_bytes: Bytes,
}

#[derive(Debug)]
pub(crate) struct Simulation {
    pub(crate) topology: Topology,
    pub(crate) routes: Routes,
    pub(crate) agent: Agent,
    pub(crate) airtime: Airtime,
    pub(crate) flows: Vec<FlowSpec>,
    pub(crate) queue_capacity: usize,
    pub(crate) rng: StdRng,
    pub(crate) stop: Nanosecs,
}

#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) counters: Vec<FlowCounters>,
    pub(crate) stats: Stats,
}

/// The mutable state of a running simulation.
struct State<'a> {
    sim: &'a mut Simulation,
    events: EventQueue<Event>,
    nodes: Vec<Node>,
    medium: Medium,
    counters: Vec<FlowCounters>,
    stats: Stats,
    now: Nanosecs,
}

impl Simulation {
    pub(crate) fn run(mut self, observer: &mut dyn TxObserver) -> Outcome {
        let nr_nodes = self.topology.nr_nodes();
        let nr_flows = self.flows.len();
        let mut state = State {
            events: EventQueue::new(),
            nodes: (0..nr_nodes).map(|_| Node::default()).collect(),
            medium: Medium::new(nr_nodes),
            counters: vec![FlowCounters::default(); nr_flows],
            stats: Stats::default(),
            now: Nanosecs::ZERO,
            sim: &mut self,
        };
        for (i, flow) in state.sim.flows.iter().enumerate() {
            if let Some(first) = flow.send_times().next() {
                state.events.push(first, Event::Send { flow: i });
            }
        }
        state.run(observer);
        state.finish()
    }
}

impl State<'_> {
    fn run(&mut self, observer: &mut dyn TxObserver) {
        let stop = self.sim.stop;
        while let Some(at) = self.events.peek_time() {
            if at >= stop {
                break;
            }
            let Some((at, event)) = self.events.pop() else {
                break;
            };
            self.now = at;
            match event {
                Event::Send { flow } => self.send(flow, observer),
                Event::Access { node } => self.access(node),
                Event::TxDone { node } => self.tx_done(node),
                Event::Arrive { node, packet } => self.arrive(node, packet),
                Event::RouteFound { node, dst } => self.route_found(node, dst),
                Event::DiscoveryTimeout { node, dst } => self.discovery_timeout(node, dst),
            }
        }
    }

    fn send(&mut self, idx: usize, observer: &mut dyn TxObserver) {
        let flow = self.sim.flows[idx];
        let packet = Packet {
            flow: idx,
            id: flow.id,
            src: flow.src,
            dst: flow.dst,
            size: flow.packet_size,
            hops: 0,
        };
        observer.on_transmit(flow.id, flow.packet_size);
        let c = &mut self.counters[idx];
        c.tx_packets += 1;
        c.tx_bytes += flow.packet_size;
        self.stats.generated += 1;
        if let Some(interval) = flow.interval() {
            let next = self.now + interval;
            if next < flow.stop {
                self.events.push(next, Event::Send { flow: idx });
            }
        }
        self.route(flow.src, packet);
    }

    /// Hands `packet` to the routing agent of `node`.
    fn route(&mut self, node: NodeId, packet: Packet) {
        if packet.hops >= MAX_HOPS {
            self.stats.drops.record(DropReason::TtlExpired);
            return;
        }
        let sim = &mut *self.sim;
        match sim.agent.route(node, packet, self.now, &sim.topology, &sim.routes) {
            Action::Forward(packet, next) => self.enqueue(node, packet, next),
            Action::Buffered => {}
            Action::Discover { dst } => {
                debug!("node {node} starts route discovery for {dst}");
                self.start_attempt(node, dst, 0);
            }
            Action::Drop(reason) => self.stats.drops.record(reason),
        }
    }

    fn start_attempt(&mut self, node: NodeId, dst: NodeId, attempt: u32) {
        let sim = &*self.sim;
        match sim.agent.attempt(node, dst, attempt, &sim.routes, &sim.airtime) {
            Attempt::Found(after) => {
                self.events
                    .push(self.now + after, Event::RouteFound { node, dst });
            }
            Attempt::TimedOut(after) => {
                self.events
                    .push(self.now + after, Event::DiscoveryTimeout { node, dst });
            }
        }
    }

    fn route_found(&mut self, node: NodeId, dst: NodeId) {
        self.stats.discoveries += 1;
        let released = self.sim.agent.found(node, dst);
        debug!(
            "node {node} found a route to {dst}, releasing {} packets",
            released.len()
        );
        for packet in released {
            self.route(node, packet);
        }
    }

    fn discovery_timeout(&mut self, node: NodeId, dst: NodeId) {
        match self.sim.agent.timed_out(node, dst) {
            Timeout::Retry(attempt) => self.start_attempt(node, dst, attempt),
            Timeout::Failed(packets) => {
                debug!(
                    "node {node} gave up on {dst}, dropping {} packets",
                    packets.len()
                );
                self.stats
                    .drops
                    .add(DropReason::DiscoveryFailed, packets.len() as u64);
            }
        }
    }

    fn enqueue(&mut self, node: NodeId, packet: Packet, next: NodeId) {
        let idx = node.inner();
        let queue_capacity = self.sim.queue_capacity;
        let n = &mut self.nodes[idx];
        if n.queue.len() >= queue_capacity {
            self.stats.drops.record(DropReason::QueueOverflow);
            return;
        }
        n.queue.push_back((packet, next));
        if !n.busy {
            n.busy = true;
            self.events.push(self.now, Event::Access { node: idx });
        }
    }

    fn access(&mut self, node: usize) {
        let idle = self.medium.idle_at(node, self.now);
        if idle > self.now {
            self.events.push(idle, Event::Access { node });
            return;
        }
        let Some((packet, next)) = self.nodes[node].queue.pop_front() else {
            self.nodes[node].busy = false;
            return;
        };
        let sim = &mut *self.sim;
        let from = NodeId::new(node);
        let Some(link) = sim.topology.link(from, next).copied() else {
            // Routes only use links, so this can only be an unreachable on-link destination.
            self.stats.drops.record(DropReason::NoRoute);
            self.events.push(self.now, Event::TxDone { node });
            return;
        };
        let start = self.now + mac::access_delay(&mut sim.rng);
        let end = start + sim.airtime.unicast(packet.size);
        let reserved = std::iter::once(node).chain(
            sim.topology
                .neighbors(from)
                .into_iter()
                .map(|n| n.inner()),
        );
        self.medium.reserve(reserved, end);
        self.stats.transmissions += 1;

        let arrival =
            start + sim.airtime.data_frame(packet.size) + propagation::delay(link.distance);
        let packet = Packet {
            hops: packet.hops + 1,
            ..packet
        };
        self.events.push(
            arrival,
            Event::Arrive {
                node: next.inner(),
                packet,
            },
        );
        self.events.push(end, Event::TxDone { node });
    }

    fn tx_done(&mut self, node: usize) {
        if self.nodes[node].queue.is_empty() {
            self.nodes[node].busy = false;
        } else {
            self.events.push(self.now, Event::Access { node });
        }
    }

    fn arrive(&mut self, node: usize, packet: Packet) {
        let here = NodeId::new(node);
        if here == packet.dst {
            self.counters[packet.flow].rx_bytes += packet.size;
            self.stats.delivered += 1;
        } else {
            self.route(here, packet);
        }
    }

    fn finish(mut self) -> Outcome {
        let on_air = self
            .events
            .drain()
            .filter(|e| matches!(e, Event::Arrive { .. }))
            .count();
        let queued = self.nodes.iter().map(|n| n.queue.len()).sum::<usize>();
        let buffered = self.sim.agent.nr_buffered();
        self.stats
            .drops
            .add(DropReason::InFlight, (on_air + queued + buffered) as u64);
        Outcome {
            counters: self.counters,
            stats: self.stats,
        }
    }
}

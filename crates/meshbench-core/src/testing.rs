//! Engine doubles for tests.

use std::net::Ipv4Addr;

use crate::{
    accounting::TxObserver,
    engine::{
        AddressPlan, Engine, EngineError, FlowHandles, NodeId, Phase, Placement, RadioConfig,
        SinkHandle, SourceHandle,
    },
    scenario::RouteProtocol,
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Nanosecs},
};

/// A call made on a [`LoopbackEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PlaceNodes(usize),
    InstallRadio,
    InstallRouting(Option<RouteProtocol>),
    AssignAddresses,
    InstallFlow(FlowId),
    Run,
}

/// An engine without a network: every transmitted packet is handed straight to its sink,
/// minus a deterministic share of losses. It records the calls made on it.
#[derive(Debug)]
pub struct LoopbackEngine {
    /// Deliver one packet out of every `deliver_every`.
    deliver_every: u64,
    phase: Phase,
    nodes: usize,
    steps: Vec<Step>,
    flows: Vec<FlowSpec>,
    rx: Vec<Bytes>,
}

impl LoopbackEngine {
    /// Delivers every packet.
    pub fn lossless() -> Self {
        Self::delivering_every(1)
    }

    /// Delivers the first of every `k` packets of each flow. `k` must be positive.
    pub fn delivering_every(k: u64) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            deliver_every: k,
            phase: Phase::default(),
            nodes: 0,
            steps: Vec::new(),
            flows: Vec::new(),
            rx: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn flows(&self) -> &[FlowSpec] {
        &self.flows
    }

    fn step(&mut self, next: Phase, step: Step) -> Result<(), EngineError> {
        self.phase.advance(next)?;
        self.steps.push(step);
        Ok(())
    }

    fn check_node(&self, id: NodeId) -> Result<(), EngineError> {
        if id.inner() >= self.nodes {
            return Err(EngineError::UnknownNode(id));
        }
        Ok(())
    }
}

impl Engine for LoopbackEngine {
    fn name(&self) -> &str {
        "loopback"
    }

    fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError> {
        self.step(Phase::Placed, Step::PlaceNodes(placement.node_count))?;
        self.nodes = placement.node_count;
        Ok((0..self.nodes).map(NodeId::new).collect())
    }

    fn install_radio(&mut self, _: &RadioConfig) -> Result<(), EngineError> {
        self.step(Phase::Radio, Step::InstallRadio)
    }

    fn install_routing(&mut self, protocol: Option<RouteProtocol>) -> Result<(), EngineError> {
        self.step(Phase::Routing, Step::InstallRouting(protocol))
    }

    fn assign_addresses(&mut self, plan: &AddressPlan) -> Result<Vec<Ipv4Addr>, EngineError> {
        self.step(Phase::Addressed, Step::AssignAddresses)?;
        Ok(plan.assign(self.nodes)?)
    }

    fn install_flow(&mut self, flow: &FlowSpec) -> Result<FlowHandles, EngineError> {
        self.check_node(flow.src)?;
        self.check_node(flow.dst)?;
        self.step(Phase::Flows, Step::InstallFlow(flow.id))?;
        let idx = self.flows.len();
        self.flows.push(*flow);
        self.rx.push(Bytes::ZERO);
        Ok(FlowHandles {
            flow: flow.id,
            source: SourceHandle::new(idx),
            sink: SinkHandle::new(idx),
        })
    }

    fn run(&mut self, stop: Nanosecs, observer: &mut dyn TxObserver) -> Result<(), EngineError> {
        self.step(Phase::Ran, Step::Run)?;
        let mut events = self
            .flows
            .iter()
            .enumerate()
            .flat_map(|(idx, flow)| {
                flow.send_times()
                    .take_while(move |&t| t < stop)
                    .enumerate()
                    .map(move |(k, t)| (t, idx, k as u64))
            })
            .collect::<Vec<_>>();
        events.sort();
        for (_, idx, k) in events {
            let flow = &self.flows[idx];
            observer.on_transmit(flow.id, flow.packet_size);
            if k % self.deliver_every == 0 {
                self.rx[idx] += flow.packet_size;
            }
        }
        Ok(())
    }

    fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError> {
        self.phase.ensure_ran()?;
        self.rx
            .get(sink.inner())
            .copied()
            .ok_or(EngineError::UnknownSink(sink))
    }
}

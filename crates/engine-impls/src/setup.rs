use std::net::Ipv4Addr;

use anyhow::anyhow;
use meshbench_core::{
    engine::{
        AddressPlan, EngineError, FlowHandles, NodeId, Phase, Placement, RadioConfig, SinkHandle,
        SourceHandle,
    },
    scenario::RouteProtocol,
    traffic::FlowSpec,
    units::Bytes,
};

/// Everything an engine is told before it runs, and the sink counters it reports after.
#[derive(Debug, Default)]
pub(crate) struct Setup {
    phase: Phase,
    placement: Option<Placement>,
    radio: Option<RadioConfig>,
    pub(crate) routing: Option<RouteProtocol>,
    pub(crate) flows: Vec<FlowSpec>,
    rx: Vec<Bytes>,
}

impl Setup {
    pub(crate) fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError> {
        self.phase.advance(Phase::Placed)?;
        self.placement = Some(*placement);
        Ok((0..placement.node_count).map(NodeId::new).collect())
    }

    pub(crate) fn install_radio(&mut self, radio: &RadioConfig) -> Result<(), EngineError> {
        self.phase.advance(Phase::Radio)?;
        self.radio = Some(*radio);
        Ok(())
    }

    pub(crate) fn install_routing(
        &mut self,
        protocol: Option<RouteProtocol>,
    ) -> Result<(), EngineError> {
        self.phase.advance(Phase::Routing)?;
        self.routing = protocol;
        Ok(())
    }

    pub(crate) fn assign_addresses(
        &mut self,
        plan: &AddressPlan,
    ) -> Result<Vec<Ipv4Addr>, EngineError> {
        self.phase.advance(Phase::Addressed)?;
        Ok(plan.assign(self.nr_nodes())?)
    }

    /// Records `flow`. Sources and sinks are numbered like the flows.
    pub(crate) fn install_flow(&mut self, flow: &FlowSpec) -> Result<FlowHandles, EngineError> {
        self.phase.advance(Phase::Flows)?;
        for node in [flow.src, flow.dst] {
            if node.inner() >= self.nr_nodes() {
                return Err(EngineError::UnknownNode(node));
            }
        }
        let idx = self.flows.len();
        self.flows.push(*flow);
        Ok(FlowHandles {
            flow: flow.id,
            source: SourceHandle::new(idx),
            sink: SinkHandle::new(idx),
        })
    }

    /// Enters the run phase, returning the placement and radio to simulate.
    pub(crate) fn start_run(&mut self) -> Result<(Placement, RadioConfig), EngineError> {
        self.phase.advance(Phase::Ran)?;
        // CORRECTNESS: `Phase::Ran` is only reachable after placement and radio installation.
        match (self.placement, self.radio) {
            (Some(placement), Some(radio)) => Ok((placement, radio)),
            _ => Err(anyhow!("run started without placement or radio").into()),
        }
    }

    /// Stores the bytes each sink received, in flow order.
    pub(crate) fn finish(&mut self, rx: Vec<Bytes>) {
        self.rx = rx;
    }

    pub(crate) fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError> {
        self.phase.ensure_ran()?;
        self.rx
            .get(sink.inner())
            .copied()
            .ok_or(EngineError::UnknownSink(sink))
    }

    fn nr_nodes(&self) -> usize {
        self.placement.map_or(0, |p| p.node_count)
    }
}

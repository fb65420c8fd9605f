//! The in-process engine, backed by [`adhoc_sim`].

use std::net::Ipv4Addr;

use adhoc_sim::{propagation::Friis, Position, Stats};
use anyhow::Context;
use meshbench_core::{
    accounting::TxObserver,
    engine::{
        AddressPlan, Engine, EngineError, FlowHandles, NodeId, Placement, RadioConfig, SinkHandle,
    },
    random::Stream,
    scenario::{RouteProtocol, ValidScenario},
    traffic::FlowSpec,
    units::{Bytes, Dbm, Nanosecs},
};

use crate::setup::Setup;

/// An engine that simulates the network in process with [`adhoc_sim`].
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct DesEngine {
    /// Seed for MAC backoff.
    #[builder(default)]
    seed: u64,
    /// Capacity of every node's transmit queue.
    #[builder(default = adhoc_sim::QUEUE_CAPACITY)]
    queue_capacity: usize,
    /// Packets an AODV source buffers per destination during route discovery.
    #[builder(default = adhoc_sim::DISCOVERY_BUFFER)]
    discovery_buffer: usize,
    /// Frames weaker than this are not received.
    #[builder(default = adhoc_sim::propagation::DEFAULT_ENERGY_DETECTION_THRESHOLD)]
    energy_detection_threshold: Dbm,
    #[builder(default, setter(skip))]
    setup: Setup,
    #[builder(default, setter(skip))]
    positions: Vec<Position>,
    #[builder(default, setter(skip))]
    stats: Option<Stats>,
}

impl DesEngine {
    /// An engine seeded from `scenario`'s engine stream, with default queues.
    pub fn for_scenario(scenario: &ValidScenario) -> Self {
        Self::builder()
            .seed(scenario.streams().seed_for(Stream::Engine))
            .build()
    }

    /// Node positions, once placed.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Packet statistics of the run, once it has happened.
    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }
}

impl Engine for DesEngine {
    fn name(&self) -> &str {
        "des"
    }

    fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError> {
        let nodes = self.setup.place_nodes(placement)?;
        self.positions =
            adhoc_sim::place_uniform(placement.node_count, placement.area, placement.seed);
        Ok(nodes)
    }

    fn install_radio(&mut self, radio: &RadioConfig) -> Result<(), EngineError> {
        self.setup.install_radio(radio)
    }

    fn install_routing(&mut self, protocol: Option<RouteProtocol>) -> Result<(), EngineError> {
        self.setup.install_routing(protocol)
    }

    fn assign_addresses(&mut self, plan: &AddressPlan) -> Result<Vec<Ipv4Addr>, EngineError> {
        self.setup.assign_addresses(plan)
    }

    fn install_flow(&mut self, flow: &FlowSpec) -> Result<FlowHandles, EngineError> {
        self.setup.install_flow(flow)
    }

    fn run(&mut self, stop: Nanosecs, observer: &mut dyn TxObserver) -> Result<(), EngineError> {
        let (_, radio) = self.setup.start_run()?;
        let friis = Friis::builder()
            .tx_gain(radio.tx_gain)
            .rx_gain(radio.rx_gain)
            .build();
        let config = adhoc_sim::Config::builder()
            .positions(self.positions.clone())
            .tx_power(radio.tx_power)
            .friis(friis)
            .energy_detection_threshold(self.energy_detection_threshold)
            .phy_mode(radio.phy_mode)
            .non_unicast_mode(radio.non_unicast_mode)
            .routing(self.setup.routing)
            .flows(self.setup.flows.clone())
            .stop(stop)
            .seed(self.seed)
            .queue_capacity(self.queue_capacity)
            .discovery_buffer(self.discovery_buffer)
            .build();
        let output = adhoc_sim::run(config, observer).context("in-process simulation failed")?;
        self.setup
            .finish(output.records.iter().map(|r| r.rx_bytes).collect());
        self.stats = Some(output.stats);
        Ok(())
    }

    fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError> {
        self.setup.total_rx(sink)
    }
}

#[cfg(test)]
mod tests {
    use meshbench_core::{
        accounting::TxByteCounter,
        traffic::FlowId,
        units::{BitsPerSec, Meters},
    };

    use super::*;

    #[test]
    fn placement_is_seeded() -> anyhow::Result<()> {
        let placement = |seed| {
            Placement::builder()
                .node_count(5)
                .area(Meters::new(1000))
                .seed(seed)
                .build()
        };
        let mut a = DesEngine::builder().build();
        let mut b = DesEngine::builder().build();
        let mut c = DesEngine::builder().build();
        a.place_nodes(&placement(1))?;
        b.place_nodes(&placement(1))?;
        c.place_nodes(&placement(2))?;
        assert_eq!(a.positions(), b.positions());
        assert_ne!(a.positions(), c.positions());
        assert!(a
            .positions()
            .iter()
            .all(|p| (0.0..=1000.0).contains(&p.x) && (0.0..=1000.0).contains(&p.y)));
        Ok(())
    }

    #[test]
    fn runs_once_and_reports_sinks() -> anyhow::Result<()> {
        let mut engine = DesEngine::builder().build();
        let nodes = engine.place_nodes(
            &Placement::builder()
                .node_count(2)
                .area(Meters::new(10))
                .build(),
        )?;
        engine.install_radio(&RadioConfig::builder().tx_power(Dbm::new(0.0)).build())?;
        engine.install_routing(Some(RouteProtocol::Olsr))?;
        let addrs = engine.assign_addresses(&AddressPlan::default())?;
        let stop = Nanosecs::from_secs(5);
        let handles = engine.install_flow(&FlowSpec {
            id: FlowId::ZERO,
            src: nodes[0],
            dst: nodes[1],
            dst_addr: addrs[1],
            port: 9,
            rate: BitsPerSec::new(5_000),
            packet_size: Bytes::new(32),
            start: Nanosecs::ZERO,
            stop,
        })?;
        let mut counter = TxByteCounter::new();
        engine.run(stop, &mut counter)?;
        // 97 packets, the first 39 before OLSR has any route
        assert_eq!(counter.total(), Bytes::new(97 * 32));
        assert_eq!(engine.total_rx(handles.sink)?, Bytes::new(58 * 32));
        assert_eq!(engine.stats().map(|s| s.drops.no_route), Some(39));
        assert!(matches!(
            engine.run(stop, &mut counter),
            Err(EngineError::AlreadyRun)
        ));
        Ok(())
    }
}

//! The ns-3 engine, backed by [`ns3_frontend`].

use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use log::{info, warn};
use meshbench_core::{
    accounting::TxObserver,
    constants,
    engine::{
        AddressPlan, Engine, EngineError, FlowHandles, NodeId, Placement, RadioConfig, SinkHandle,
    },
    scenario::{RouteProtocol, ValidScenario},
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Nanosecs},
};
use ns3_frontend::{Launcher, Ns3Record, Ns3Simulation};
use rustc_hash::FxHashMap;

use crate::setup::Setup;

/// An engine that runs an external ns-3 scenario program.
///
/// ns-3 reports per-flow counters only after the run, so the transmit observer is called
/// afterwards: each flow's transmitted packets are replayed at their scheduled send times, in
/// simulated-time order across flows.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Ns3Engine {
    /// The root of the ns-3 source tree.
    #[builder(setter(into))]
    ns3_dir: PathBuf,
    /// Where to write inputs and outputs.
    #[builder(setter(into))]
    data_dir: PathBuf,
    /// The scenario program, as the launcher names it.
    #[builder(default = ns3_frontend::DEFAULT_PROGRAM.to_owned(), setter(into))]
    program: String,
    #[builder(default)]
    launcher: Launcher,
    /// The ns-3 global seed.
    #[builder(default = constants::SEED)]
    seed: u64,
    /// The ns-3 run number.
    #[builder(default = constants::RUN)]
    run: u64,
    #[builder(default, setter(skip))]
    setup: Setup,
}

impl Ns3Engine {
    /// An engine for `scenario`'s seed and run number.
    pub fn for_scenario(
        scenario: &ValidScenario,
        ns3_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::builder()
            .ns3_dir(ns3_dir)
            .data_dir(data_dir)
            .seed(scenario.seed)
            .run(scenario.run)
            .build()
    }
}

impl Engine for Ns3Engine {
    fn name(&self) -> &str {
        "ns-3"
    }

    fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError> {
        self.setup.place_nodes(placement)
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
        let (placement, radio) = self.setup.start_run()?;
        let sim = Ns3Simulation::builder()
            .ns3_dir(self.ns3_dir.clone())
            .data_dir(self.data_dir.clone())
            .program(self.program.clone())
            .launcher(self.launcher)
            .placement(placement)
            .radio(radio)
            .routing(self.setup.routing)
            .seed(self.seed)
            .run(self.run)
            .stop(stop)
            .flows(self.setup.flows.clone())
            .build();
        info!("Running {} in {}", self.program, self.data_dir.display());
        let records = sim.run().context("ns-3 simulation failed")?;
        let records = match_records(&self.setup.flows, records)?;
        replay(&self.setup.flows, &records, stop, observer);
        self.setup
            .finish(records.iter().map(|r| r.rx_bytes).collect());
        Ok(())
    }

    fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError> {
        self.setup.total_rx(sink)
    }
}

/// Orders `records` like `flows`, failing if any flow has no record.
fn match_records(
    flows: &[FlowSpec],
    records: Vec<Ns3Record>,
) -> anyhow::Result<Vec<Ns3Record>> {
    let mut by_id = records
        .into_iter()
        .map(|r| (r.id, r))
        .collect::<FxHashMap<FlowId, _>>();
    flows
        .iter()
        .map(|f| {
            let record = by_id
                .remove(&f.id)
                .ok_or_else(|| anyhow!("ns-3 wrote no record for flow {}", f.id))?;
            let expected = Bytes::new(record.tx_packets.saturating_mul(f.packet_size.into_u64()));
            if record.tx_bytes != expected {
                warn!(
                    "flow {}: ns-3 reports {} transmitted in {} packets of {}",
                    f.id, record.tx_bytes, record.tx_packets, f.packet_size
                );
            }
            Ok(record)
        })
        .collect()
}

/// Calls `observer` for the first `tx_packets` sends of every flow, in time order.
fn replay(
    flows: &[FlowSpec],
    records: &[Ns3Record],
    stop: Nanosecs,
    observer: &mut dyn TxObserver,
) {
    let mut sends = flows
        .iter()
        .zip(records)
        .enumerate()
        .flat_map(|(idx, (flow, record))| {
            flow.send_times()
                .take_while(move |&t| t < stop)
                .take(usize::try_from(record.tx_packets).unwrap_or(usize::MAX))
                .map(move |t| (t, idx))
        })
        .collect::<Vec<_>>();
    sends.sort();
    for (_, idx) in sends {
        let flow = &flows[idx];
        observer.on_transmit(flow.id, flow.packet_size);
    }
}

#[cfg(test)]
mod tests {
    use meshbench_core::units::BitsPerSec;

    use super::*;

    fn flow(id: usize, rate: u64) -> FlowSpec {
        FlowSpec {
            id: FlowId::new(id),
            src: NodeId::new(id),
            dst: NodeId::new(id + 1),
            dst_addr: Ipv4Addr::new(10, 0, 0, id as u8 + 2),
            port: 9,
            rate: BitsPerSec::new(rate),
            packet_size: Bytes::new(32),
            start: Nanosecs::ZERO,
            stop: Nanosecs::from_secs(1),
        }
    }

    fn record(id: usize, tx_packets: u64, rx_bytes: u64) -> Ns3Record {
        Ns3Record {
            id: FlowId::new(id),
            tx_packets,
            tx_bytes: Bytes::new(tx_packets * 32),
            rx_bytes: Bytes::new(rx_bytes),
        }
    }

    #[test]
    fn records_follow_flow_order() -> anyhow::Result<()> {
        let flows = [flow(0, 2_560), flow(1, 2_560)];
        let records = match_records(&flows, vec![record(1, 9, 64), record(0, 9, 96)])?;
        assert_eq!(records[0].id, FlowId::new(0));
        assert_eq!(records[1].rx_bytes, Bytes::new(64));
        Ok(())
    }

    #[test]
    fn missing_records_fail() {
        let flows = [flow(0, 2_560), flow(1, 2_560)];
        assert!(match_records(&flows, vec![record(0, 9, 96)]).is_err());
    }

    #[test]
    fn replay_interleaves_flows_in_time() {
        // 100 ms and 50 ms between packets
        let flows = [flow(0, 2_560), flow(1, 5_120)];
        let records = [record(0, 2, 0), record(1, 3, 0)];
        let mut seen = Vec::new();
        let mut observer = |id: FlowId, _: Bytes| seen.push(id.inner());
        replay(&flows, &records, Nanosecs::from_secs(1), &mut observer);
        // Flow 1 at 50, 100 and 150 ms, flow 0 at 100 and 200 ms. Ties go to the first flow.
        assert_eq!(seen, vec![1, 0, 1, 1, 0]);
    }
}

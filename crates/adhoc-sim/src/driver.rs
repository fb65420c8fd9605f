use log::info;
use meshbench_core::{
    accounting::TxObserver,
    engine::NodeId,
    scenario::{PhyMode, RouteProtocol},
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Dbm, Nanosecs},
};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    agent::Agent,
    geometry::Position,
    mac::Airtime,
    propagation::{Friis, DEFAULT_ENERGY_DETECTION_THRESHOLD},
    routing::Routes,
    simulation::Simulation,
    stats::Stats,
    topology::{Topology, TopologyError},
};

/// Default capacity of every node's transmit queue.
pub const QUEUE_CAPACITY: usize = 400;

/// Default number of packets an AODV source buffers per destination during discovery.
pub const DISCOVERY_BUFFER: usize = 64;

/// The simulation configuration.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Config {
    /// Node `i` sits at `positions[i]`.
    pub positions: Vec<Position>,
    /// Transmit power of every node.
    pub tx_power: Dbm,
    /// Path loss model, including antenna gains.
    #[builder(default)]
    pub friis: Friis,
    /// Frames weaker than this are not received.
    #[builder(default = DEFAULT_ENERGY_DETECTION_THRESHOLD)]
    pub energy_detection_threshold: Dbm,
    /// Data mode for unicast frames.
    #[builder(default)]
    pub phy_mode: PhyMode,
    /// Mode for broadcasts and control frames.
    #[builder(default)]
    pub non_unicast_mode: PhyMode,
    /// The routing protocol. Without one, packets only reach direct neighbors.
    #[builder(default)]
    pub routing: Option<RouteProtocol>,
    /// The flows to simulate.
    pub flows: Vec<FlowSpec>,
    /// Events at or after this time are discarded.
    pub stop: Nanosecs,
    /// Seed for MAC backoff.
    #[builder(default)]
    pub seed: u64,
    #[builder(default = QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    #[builder(default = DISCOVERY_BUFFER)]
    pub discovery_buffer: usize,
}

/// Counters of one flow after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Record {
    pub id: FlowId,
    pub tx_packets: u64,
    pub tx_bytes: Bytes,
    pub rx_bytes: Bytes,
}

/// The result of a run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Output {
    /// One record per flow, in configuration order.
    pub records: Vec<Record>,
    pub stats: Stats,
}

/// Runs a simulation to `config.stop`, calling `observer` for every packet a source emits.
///
/// Returns an error if a flow references a node without a position or if the positions are
/// not usable.
pub fn run(config: Config, observer: &mut dyn TxObserver) -> Result<Output, Error> {
    let nr_nodes = config.positions.len();
    for flow in &config.flows {
        for node in [flow.src, flow.dst] {
            if node.inner() >= nr_nodes {
                return Err(Error::UnknownNode { flow: flow.id, node });
            }
        }
    }
    let topology = Topology::new(
        &config.positions,
        &config.friis,
        config.tx_power,
        config.energy_detection_threshold,
    )?;
    let routes = Routes::new(&topology);
    info!(
        "Simulating {} nodes with {} links and {} flows until {}",
        nr_nodes,
        topology.links().count(),
        config.flows.len(),
        config.stop
    );
    let ids = config.flows.iter().map(|f| f.id).collect::<Vec<_>>();
    let sim = Simulation {
        topology,
        routes,
        agent: Agent::new(config.routing, config.discovery_buffer),
        airtime: Airtime::new(config.phy_mode, config.non_unicast_mode),
        flows: config.flows,
        queue_capacity: config.queue_capacity,
        rng: StdRng::seed_from_u64(config.seed),
        stop: config.stop,
    };
    let outcome = sim.run(observer);
    info!("{}", outcome.stats);
    let records = ids
        .into_iter()
        .zip(outcome.counters)
        .map(|(id, c)| Record {
            id,
            tx_packets: c.tx_packets,
            tx_bytes: c.tx_bytes,
            rx_bytes: c.rx_bytes,
        })
        .collect();
    Ok(Output {
        records,
        stats: outcome.stats,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("flow {flow} references node {node}, which has no position")]
    UnknownNode { flow: FlowId, node: NodeId },

    #[error("invalid topology")]
    Topology(#[from] TopologyError),
}

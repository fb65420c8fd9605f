//! The interface between the experiment orchestrator and a simulation engine.
//!
//! An engine owns everything below the application layer: node positions, the channel, the
//! MAC, routing and packet delivery. The orchestrator drives it through the [`Engine`] trait
//! in a fixed order:
//!
//! 1. [`Engine::place_nodes`]
//! 2. [`Engine::install_radio`]
//! 3. [`Engine::install_routing`]
//! 4. [`Engine::assign_addresses`]
//! 5. [`Engine::install_flow`], once per flow
//! 6. [`Engine::run`], exactly once
//! 7. [`Engine::total_rx`], once per sink
//!
//! [`Phase`] implements this ordering so engines can reject out-of-order calls uniformly.

use std::net::Ipv4Addr;

use crate::{
    accounting::TxObserver,
    constants,
    scenario::{PhyMode, RouteProtocol, ValidScenario},
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Dbm, Meters, Nanosecs},
};

identifier!(
    /// A node, numbered by creation order.
    NodeId,
    usize
);
identifier!(
    /// An installed traffic source.
    SourceHandle,
    usize
);
identifier!(
    /// An installed packet sink, used to read its counter after the run.
    SinkHandle,
    usize
);

/// A simulation engine.
pub trait Engine {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Creates `placement.node_count` nodes at uniformly random positions in the square
    /// `[0, area]^2`. The returned IDs are indexed by node position.
    fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError>;

    /// Installs the PHY, MAC and channel on every node.
    fn install_radio(&mut self, radio: &RadioConfig) -> Result<(), EngineError>;

    /// Installs the network stack with the given routing protocol. `None` installs the stack
    /// without any routing protocol.
    fn install_routing(&mut self, protocol: Option<RouteProtocol>) -> Result<(), EngineError>;

    /// Numbers every node's device from `plan`. The returned addresses are indexed like the
    /// nodes returned by [`Engine::place_nodes`].
    fn assign_addresses(&mut self, plan: &AddressPlan) -> Result<Vec<Ipv4Addr>, EngineError>;

    /// Installs a traffic source on `flow.src` and a sink on `flow.dst`.
    fn install_flow(&mut self, flow: &FlowSpec) -> Result<FlowHandles, EngineError>;

    /// Runs the simulation until `stop`, calling `observer` once for every packet a source
    /// transmits. Events scheduled past `stop` are discarded.
    fn run(&mut self, stop: Nanosecs, observer: &mut dyn TxObserver) -> Result<(), EngineError>;

    /// The number of payload bytes `sink` received during the run.
    fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError>;
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn place_nodes(&mut self, placement: &Placement) -> Result<Vec<NodeId>, EngineError> {
        (**self).place_nodes(placement)
    }

    fn install_radio(&mut self, radio: &RadioConfig) -> Result<(), EngineError> {
        (**self).install_radio(radio)
    }

    fn install_routing(&mut self, protocol: Option<RouteProtocol>) -> Result<(), EngineError> {
        (**self).install_routing(protocol)
    }

    fn assign_addresses(&mut self, plan: &AddressPlan) -> Result<Vec<Ipv4Addr>, EngineError> {
        (**self).assign_addresses(plan)
    }

    fn install_flow(&mut self, flow: &FlowSpec) -> Result<FlowHandles, EngineError> {
        (**self).install_flow(flow)
    }

    fn run(&mut self, stop: Nanosecs, observer: &mut dyn TxObserver) -> Result<(), EngineError> {
        (**self).run(stop, observer)
    }

    fn total_rx(&self, sink: SinkHandle) -> Result<Bytes, EngineError> {
        (**self).total_rx(sink)
    }
}

/// The handles of an installed flow's source and sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FlowHandles {
    pub flow: FlowId,
    pub source: SourceHandle,
    pub sink: SinkHandle,
}

/// Where to put the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder, serde::Serialize)]
pub struct Placement {
    pub node_count: usize,
    /// Side length of the square.
    pub area: Meters,
    /// Seed for the position draws.
    #[builder(default)]
    pub seed: u64,
}

impl Placement {
    pub fn from_scenario(scenario: &ValidScenario) -> Self {
        Self::builder()
            .node_count(scenario.node_count)
            .area(scenario.area)
            .seed(scenario.streams().seed_for(crate::random::Stream::Placement))
            .build()
    }
}

/// PHY and MAC parameters shared by every node.
#[derive(Debug, Clone, Copy, PartialEq, typed_builder::TypedBuilder, serde::Serialize)]
pub struct RadioConfig {
    /// Transmit power, used as both the minimum and maximum PHY power level.
    pub tx_power: Dbm,
    /// Receive antenna gain in dB.
    #[builder(default)]
    pub rx_gain: f64,
    /// Transmit antenna gain in dB.
    #[builder(default)]
    pub tx_gain: f64,
    /// Data mode for unicast frames and control mode for the rest.
    #[builder(default)]
    pub phy_mode: PhyMode,
    /// Mode used for broadcast and multicast frames.
    #[builder(default)]
    pub non_unicast_mode: PhyMode,
    #[builder(default = constants::FRAGMENTATION_THRESHOLD)]
    pub fragmentation_threshold: Bytes,
}

impl RadioConfig {
    pub fn from_scenario(scenario: &ValidScenario) -> Self {
        Self::builder()
            .tx_power(scenario.tx_power.to_dbm())
            .phy_mode(scenario.phy_mode)
            .non_unicast_mode(scenario.phy_mode)
            .build()
    }
}

/// An IPv4 network to number devices from.
///
/// Node `i` gets host number `i + 1`, so the first node on `10.0.0.0/8` is `10.0.0.1`, and the
/// 256th is `10.0.1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AddressPlan {
    base: Ipv4Addr,
    mask: Ipv4Addr,
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self {
            base: constants::ADDRESS_BASE,
            mask: constants::ADDRESS_MASK,
        }
    }
}

impl AddressPlan {
    /// Creates a new plan. The mask must be contiguous and `base` must not have host bits set.
    pub fn new(base: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, AddressError> {
        let m = u32::from(mask);
        // CORRECTNESS: A contiguous mask has all its ones before its zeros.
        if m.leading_ones() + m.trailing_zeros() != 32 {
            return Err(AddressError::NonContiguousMask(mask));
        }
        if u32::from(base) & !m != 0 {
            return Err(AddressError::HostBitsSet { base, mask });
        }
        Ok(Self { base, mask })
    }

    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn mask(&self) -> Ipv4Addr {
        self.mask
    }

    /// The number of assignable host addresses, excluding network and broadcast.
    pub fn capacity(&self) -> u64 {
        let host_bits = u32::from(self.mask).trailing_zeros();
        (1u64 << host_bits).saturating_sub(2)
    }

    /// The address of the node at position `i`.
    pub fn address(&self, i: usize) -> Result<Ipv4Addr, AddressError> {
        let host = i as u64 + 1;
        if host > self.capacity() {
            return Err(AddressError::Exhausted {
                requested: i + 1,
                capacity: self.capacity(),
            });
        }
        // The capacity check bounds `host` below 2^32.
        Ok(Ipv4Addr::from(u32::from(self.base) | host as u32))
    }

    /// Addresses for nodes `0..n`.
    pub fn assign(&self, n: usize) -> Result<Vec<Ipv4Addr>, AddressError> {
        (0..n).map(|i| self.address(i)).collect()
    }
}

/// Address assignment error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("network mask {0} is not contiguous")]
    NonContiguousMask(Ipv4Addr),

    #[error("network address {base} has host bits set under mask {mask}")]
    HostBitsSet { base: Ipv4Addr, mask: Ipv4Addr },

    #[error("cannot number {requested} devices in a network of {capacity} hosts")]
    Exhausted { requested: usize, capacity: u64 },
}

/// The setup phases of an engine, in the order they must occur.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    #[default]
    Empty,
    Placed,
    Radio,
    Routing,
    Addressed,
    Flows,
    Ran,
}

impl Phase {
    /// Moves to `next`, failing if that skips or repeats a step. Installing flows may repeat,
    /// and a run with no flows is allowed.
    pub fn advance(&mut self, next: Phase) -> Result<(), EngineError> {
        if *self == Phase::Ran {
            return Err(EngineError::AlreadyRun);
        }
        let ok = match next {
            Phase::Empty => false,
            Phase::Flows | Phase::Ran => matches!(self, Phase::Addressed | Phase::Flows),
            _ => (*self as u8) + 1 == next as u8,
        };
        if !ok {
            return Err(EngineError::OutOfOrder {
                attempted: next,
                current: *self,
            });
        }
        *self = next;
        Ok(())
    }

    /// Fails unless the engine has run.
    pub fn ensure_ran(&self) -> Result<(), EngineError> {
        match self {
            Phase::Ran => Ok(()),
            _ => Err(EngineError::NotRun),
        }
    }
}

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A flow referenced a node the engine never created.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A sink handle the engine never returned.
    #[error("unknown sink {0}")]
    UnknownSink(SinkHandle),

    /// Setup steps were called in the wrong order.
    #[error("cannot enter phase {attempted:?} from phase {current:?}")]
    OutOfOrder { attempted: Phase, current: Phase },

    /// The engine has already run.
    #[error("engine has already run")]
    AlreadyRun,

    /// Counters were read before the run.
    #[error("engine has not run yet")]
    NotRun,

    #[error("failed to assign addresses")]
    Address(#[from] AddressError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// An engine-specific failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

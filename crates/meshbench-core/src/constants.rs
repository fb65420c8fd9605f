//! Scenario defaults. These match the parameters of the wireless throughput experiment this
//! driver was built for.

use std::net::Ipv4Addr;

use crate::units::{BitsPerSec, Bytes, Meters, Milliwatts, Nanosecs};

/// Number of nodes in the topology.
pub const NODE_COUNT: usize = 20;

/// Side length of the square deployment area.
pub const AREA: Meters = Meters::new(1000);

/// Per-node transmit power.
pub const TX_POWER: Milliwatts = Milliwatts::new(1.0);

/// Routing protocol installed on every node.
pub const ROUTE_PROTOCOL: &str = "AODV";

/// Aggregate offered load as a fraction of [`NETWORK_RATE`].
pub const TRAFFIC_INTENSITY: f64 = 0.1;

/// Nominal capacity of the shared channel, 1 Mb/s.
pub const NETWORK_RATE: BitsPerSec = BitsPerSec::new(1_000_000);

/// Application payload of every packet.
pub const PACKET_SIZE: Bytes = Bytes::new(32);

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_PACKET_SIZE: Bytes = Bytes::new(65_507);

/// Simulated time after which sources stop and the run ends.
pub const SIM_DURATION: Nanosecs = Nanosecs::from_secs(5);

/// Global seed.
pub const SEED: u64 = 11_223_344;

/// Default run number (stream selector) for [`SEED`].
pub const RUN: u64 = 1;

/// UDP port on which every sink listens.
pub const SINK_PORT: u16 = 9;

/// Frames larger than this are fragmented by the MAC.
pub const FRAGMENTATION_THRESHOLD: Bytes = Bytes::new(2200);

/// Network address and mask the devices are numbered from.
pub const ADDRESS_BASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);
pub const ADDRESS_MASK: Ipv4Addr = Ipv4Addr::new(255, 0, 0, 0);

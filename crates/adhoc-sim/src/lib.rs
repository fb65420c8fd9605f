//! A packet-level simulator of static wireless ad-hoc networks.
//!
//! Given [node positions](Config), a radio configuration, a routing protocol and a list of
//! constant-bit-rate [flows](meshbench_core::FlowSpec), [run] moves every packet hop by hop
//! over an 802.11b-like shared channel and reports what each sink received.
//!
//! The model is coarse: free-space propagation with a hard reception threshold,
//! collision-free channel reservations, and routing protocols reduced to when shortest-path
//! routes become usable. See the [`mac`] and [`agent`] modules for the details.

#![warn(unreachable_pub, missing_debug_implementations)]

pub mod agent;
pub mod geometry;
pub mod mac;
pub mod propagation;
pub mod routing;
pub mod stats;
pub mod topology;

pub(crate) mod driver;
pub(crate) mod event;
pub(crate) mod simulation;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{run, Config, Error, Output, Record, DISCOVERY_BUFFER, QUEUE_CAPACITY};
pub use geometry::{place_uniform, Position};
pub use simulation::MAX_HOPS;
pub use stats::{DropReason, Drops, Stats};
pub use topology::{Topology, TopologyError};

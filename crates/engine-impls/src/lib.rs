//! This crate contains implementations of the [`Engine`](meshbench_core::Engine) trait.
//! The types here bridge the experiment orchestrator and its backend simulators.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod des;
pub mod ns3;

mod setup;

pub use crate::des::DesEngine;
pub use crate::ns3::Ns3Engine;

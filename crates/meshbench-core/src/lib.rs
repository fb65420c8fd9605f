#![warn(unreachable_pub, missing_debug_implementations)]

//! The core meshbench library. This crate defines [the orchestrator](experiment::run) that
//! turns a [`Scenario`] into a [`Report`] by driving a simulation [`Engine`].

#[macro_use]
mod ident;

pub mod accounting;
pub mod constants;
pub mod engine;
pub mod experiment;
pub mod random;
pub mod report;
pub mod scenario;
pub mod testing;
pub mod traffic;
pub mod units;

pub use accounting::{TxByteCounter, TxObserver};
pub use engine::{
    AddressError, AddressPlan, Engine, EngineError, FlowHandles, NodeId, Phase, Placement,
    RadioConfig, SinkHandle, SourceHandle,
};
pub use experiment::{run, Experiment, ExperimentError};
pub use report::Report;
pub use scenario::{PhyMode, RouteProtocol, Scenario, ScenarioError, ValidScenario};
pub use traffic::{FlowId, FlowSpec, TrafficError};

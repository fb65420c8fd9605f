//! Simulation engines: the in-process [`DesEngine`] and the external [`Ns3Engine`], along with
//! the libraries behind them.

pub use adhoc_sim;
pub use engine_impls::*;
pub use ns3_frontend;

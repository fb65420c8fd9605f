//! This module defines experiment scenarios ([`Scenario`]): the parameters of one run, from
//! topology size and radio power to traffic intensity and seeding.

use std::fmt;
use std::str::FromStr;

use log::error;

use crate::{
    constants,
    random::Streams,
    units::{BitsPerSec, Bytes, Meters, Milliwatts, Nanosecs},
};

/// An experiment scenario.
///
/// Every field has a default, so a scenario can be built from just the parameters that
/// differ:
///
/// ```
/// use meshbench_core::{scenario::Scenario, units::Meters};
///
/// let scenario = Scenario::builder()
///     .node_count(4)
///     .area(Meters::new(500))
///     .route_protocol("OLSR")
///     .build();
/// assert_eq!(scenario.traffic_intensity, 0.1);
/// ```
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Scenario {
    /// Number of nodes.
    #[builder(default = constants::NODE_COUNT)]
    pub node_count: usize,
    /// Side length of the square deployment area.
    #[builder(default = constants::AREA)]
    pub area: Meters,
    /// Per-node transmit power.
    #[builder(default = constants::TX_POWER)]
    pub tx_power: Milliwatts,
    /// Routing protocol name, kept verbatim for reporting.
    #[builder(default = constants::ROUTE_PROTOCOL.to_owned(), setter(into))]
    pub route_protocol: String,
    /// Aggregate offered load as a fraction of `network_rate`. Not range-checked.
    #[builder(default = constants::TRAFFIC_INTENSITY)]
    pub traffic_intensity: f64,
    /// Nominal channel capacity that `traffic_intensity` is a fraction of.
    #[builder(default = constants::NETWORK_RATE)]
    pub network_rate: BitsPerSec,
    /// Application payload per packet.
    #[builder(default = constants::PACKET_SIZE)]
    pub packet_size: Bytes,
    /// Simulated duration of the run.
    #[builder(default = constants::SIM_DURATION)]
    pub duration: Nanosecs,
    /// Global seed.
    #[builder(default = constants::SEED)]
    pub seed: u64,
    /// Run number, selecting independent random streams for the same seed.
    #[builder(default = constants::RUN)]
    pub run: u64,
    /// PHY data and control mode.
    #[builder(default)]
    pub phy_mode: PhyMode,
    /// Reject unknown routing protocols instead of running without one.
    #[builder(default)]
    pub strict_routing: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Scenario {
    /// Validate a scenario, producing a [`ValidScenario`].
    ///
    /// Correctness properties:
    ///
    /// - There must be at least two nodes, otherwise no node can pick a peer other than itself.
    /// - Packets must carry at least one byte.
    /// - Transmit power must be a positive, finite number of milliwatts.
    ///
    /// An unrecognized routing protocol is an error only with `strict_routing`. Otherwise it is
    /// logged and the scenario runs without a routing protocol.
    pub fn validate(self) -> Result<ValidScenario, ScenarioError> {
        // CORRECTNESS: There must be at least two nodes.
        if self.node_count < 2 {
            return Err(ScenarioError::TooFewNodes(self.node_count));
        }
        // CORRECTNESS: Packets must carry at least one byte.
        if self.packet_size == Bytes::ZERO {
            return Err(ScenarioError::EmptyPackets);
        }
        // CORRECTNESS: Packets must fit in one UDP datagram.
        if self.packet_size > constants::MAX_PACKET_SIZE {
            return Err(ScenarioError::OversizedPackets(self.packet_size));
        }
        // CORRECTNESS: Transmit power must be positive and finite.
        let mw = self.tx_power.into_f64();
        if !(mw.is_finite() && mw > 0.0) {
            return Err(ScenarioError::InvalidTxPower(self.tx_power));
        }
        let routing = match self.route_protocol.parse::<RouteProtocol>() {
            Ok(protocol) => Some(protocol),
            Err(e) if self.strict_routing => return Err(e.into()),
            Err(e) => {
                error!("{e}; continuing without a routing protocol");
                None
            }
        };
        Ok(ValidScenario {
            scenario: self,
            routing,
        })
    }
}

/// A `ValidScenario` is a [`Scenario`] that has been validated. It satisfies the properties
/// listed in [`Scenario::validate`] and has its routing protocol resolved.
#[derive(Debug, Clone)]
pub struct ValidScenario {
    scenario: Scenario,
    routing: Option<RouteProtocol>,
}

impl ValidScenario {
    /// The routing protocol to install, or `None` if the requested one was not recognized.
    pub fn routing(&self) -> Option<RouteProtocol> {
        self.routing
    }

    /// The random streams for this scenario's seed and run.
    pub fn streams(&self) -> Streams {
        Streams::new(self.scenario.seed, self.scenario.run)
    }
}

impl std::ops::Deref for ValidScenario {
    type Target = Scenario;

    fn deref(&self) -> &Self::Target {
        &self.scenario
    }
}

/// Ad-hoc routing protocols an engine can install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RouteProtocol {
    /// Ad hoc On-Demand Distance Vector.
    #[serde(rename = "AODV")]
    Aodv,
    /// Optimized Link State Routing.
    #[serde(rename = "OLSR")]
    Olsr,
}

impl RouteProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteProtocol::Aodv => "AODV",
            RouteProtocol::Olsr => "OLSR",
        }
    }
}

impl fmt::Display for RouteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteProtocol {
    type Err = UnknownRouteProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AODV" => Ok(RouteProtocol::Aodv),
            "OLSR" => Ok(RouteProtocol::Olsr),
            _ => Err(UnknownRouteProtocol(s.to_owned())),
        }
    }
}

/// The routing protocol name was neither `AODV` nor `OLSR`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid routing protocol {0:?} (expected \"AODV\" or \"OLSR\")")]
pub struct UnknownRouteProtocol(pub String);

/// 802.11b DSSS/CCK PHY modes.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PhyMode {
    #[default]
    DsssRate1Mbps,
    DsssRate2Mbps,
    DsssRate5_5Mbps,
    DsssRate11Mbps,
}

impl PhyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhyMode::DsssRate1Mbps => "DsssRate1Mbps",
            PhyMode::DsssRate2Mbps => "DsssRate2Mbps",
            PhyMode::DsssRate5_5Mbps => "DsssRate5_5Mbps",
            PhyMode::DsssRate11Mbps => "DsssRate11Mbps",
        }
    }

    /// The PHY data rate of this mode.
    pub fn data_rate(&self) -> BitsPerSec {
        match self {
            PhyMode::DsssRate1Mbps => BitsPerSec::new(1_000_000),
            PhyMode::DsssRate2Mbps => BitsPerSec::new(2_000_000),
            PhyMode::DsssRate5_5Mbps => BitsPerSec::new(5_500_000),
            PhyMode::DsssRate11Mbps => BitsPerSec::new(11_000_000),
        }
    }
}

impl fmt::Display for PhyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhyMode {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DsssRate1Mbps" => Ok(PhyMode::DsssRate1Mbps),
            "DsssRate2Mbps" => Ok(PhyMode::DsssRate2Mbps),
            "DsssRate5_5Mbps" => Ok(PhyMode::DsssRate5_5Mbps),
            "DsssRate11Mbps" => Ok(PhyMode::DsssRate11Mbps),
            _ => Err(ScenarioError::UnknownPhyMode(s.to_owned())),
        }
    }
}

/// Scenario validation error.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Fewer than two nodes.
    #[error("nodeCount must be >= 2 (got {0})")]
    TooFewNodes(usize),

    /// Zero-byte packets.
    #[error("packetSize must be at least one byte")]
    EmptyPackets,

    /// Packets larger than one UDP datagram.
    #[error("packetSize must be at most {} (got {0})", constants::MAX_PACKET_SIZE)]
    OversizedPackets(Bytes),

    /// Non-positive or non-finite transmit power.
    #[error("txPower must be a positive number of milliwatts (got {0})")]
    InvalidTxPower(Milliwatts),

    /// The routing protocol was not recognized and `strict_routing` is set.
    #[error(transparent)]
    UnknownRouteProtocol(#[from] UnknownRouteProtocol),

    /// The PHY mode was not recognized.
    #[error("unknown PHY mode {0:?}")]
    UnknownPhyMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_is_valid() {
        let valid = Scenario::default().validate().unwrap();
        assert_eq!(valid.routing(), Some(RouteProtocol::Aodv));
        assert_eq!(valid.node_count, 20);
        assert_eq!(valid.area, Meters::new(1000));
    }

    #[test]
    fn single_node_fails() {
        let scenario = Scenario::builder().node_count(1).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::TooFewNodes(1))
        ));
        let scenario = Scenario::builder().node_count(0).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::TooFewNodes(0))
        ));
    }

    #[test]
    fn empty_packets_fail() {
        let scenario = Scenario::builder().packet_size(Bytes::ZERO).build();
        assert!(matches!(scenario.validate(), Err(ScenarioError::EmptyPackets)));
    }

    #[test]
    fn oversized_packets_fail() {
        let largest = Scenario::builder().packet_size(constants::MAX_PACKET_SIZE).build();
        assert!(largest.validate().is_ok());
        for size in [65_508, 4_000_000_000_000_000_000] {
            let scenario = Scenario::builder().packet_size(Bytes::new(size)).build();
            assert!(
                matches!(scenario.validate(), Err(ScenarioError::OversizedPackets(..))),
                "{size} bytes were accepted"
            );
        }
    }

    #[test]
    fn non_positive_tx_power_fails() {
        for mw in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let scenario = Scenario::builder().tx_power(Milliwatts::new(mw)).build();
            assert!(
                matches!(scenario.validate(), Err(ScenarioError::InvalidTxPower(..))),
                "{mw} mW was accepted"
            );
        }
    }

    #[test]
    fn unknown_protocol_runs_without_routing() {
        let valid = Scenario::builder()
            .route_protocol("BOGUS")
            .build()
            .validate()
            .unwrap();
        assert_eq!(valid.routing(), None);
        assert_eq!(valid.route_protocol, "BOGUS");
    }

    #[test]
    fn unknown_protocol_fails_when_strict() {
        let scenario = Scenario::builder()
            .route_protocol("aodv")
            .strict_routing(true)
            .build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UnknownRouteProtocol(..))
        ));
    }

    #[test]
    fn protocol_names_are_case_sensitive() {
        assert_eq!("OLSR".parse::<RouteProtocol>(), Ok(RouteProtocol::Olsr));
        assert!("olsr".parse::<RouteProtocol>().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() -> anyhow::Result<()> {
        let scenario: Scenario =
            serde_json::from_str(r#"{ "nodeCount": 4, "routeProtocol": "OLSR" }"#)?;
        assert_eq!(scenario.node_count, 4);
        assert_eq!(scenario.route_protocol, "OLSR");
        assert_eq!(scenario.packet_size, Bytes::new(32));
        assert_eq!(scenario.phy_mode, PhyMode::DsssRate1Mbps);
        Ok(())
    }
}

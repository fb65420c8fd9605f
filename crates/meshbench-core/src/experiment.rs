//! The experiment orchestrator.
//!
//! An [`Experiment`] configures an [`Engine`] from a scenario, pairs every node with a random
//! peer, installs one flow per node, runs the simulation and aggregates the byte counters
//! into a [`Report`].

use log::{debug, info, warn};

use crate::{
    accounting::{Tee, TxByteCounter},
    engine::{AddressPlan, Engine, EngineError, FlowHandles, Placement, RadioConfig},
    random::Stream,
    report::Report,
    scenario::{Scenario, ScenarioError, ValidScenario},
    traffic::{self, FlowId, FlowSpec, FlowTemplate, TrafficError},
    units::Bytes,
};

/// Runs `scenario` on `engine`.
pub fn run<E: Engine + ?Sized>(
    scenario: Scenario,
    engine: &mut E,
) -> Result<Report, ExperimentError> {
    Experiment::new(scenario)?.run(engine)
}

/// A validated experiment, ready to run on any engine.
#[derive(Debug, Clone)]
pub struct Experiment {
    scenario: ValidScenario,
}

impl Experiment {
    pub fn new(scenario: Scenario) -> Result<Self, ExperimentError> {
        let scenario = scenario.validate()?;
        Ok(Self { scenario })
    }

    pub fn scenario(&self) -> &ValidScenario {
        &self.scenario
    }

    /// Sets up the engine, runs it to the end of the scenario and reports.
    ///
    /// The engine must be fresh: engines run at most once.
    pub fn run<E: Engine + ?Sized>(&self, engine: &mut E) -> Result<Report, ExperimentError> {
        let sc = &self.scenario;
        let n = sc.node_count;
        info!("Setting up {} nodes on the {} engine", n, engine.name());

        let nodes = engine.place_nodes(&Placement::from_scenario(sc))?;
        check_count("nodes", n, nodes.len())?;
        engine.install_radio(&RadioConfig::from_scenario(sc))?;
        engine.install_routing(sc.routing())?;
        let addrs = engine.assign_addresses(&AddressPlan::default())?;
        check_count("addresses", n, addrs.len())?;

        let peers = traffic::assign_peers(n, &mut sc.streams().rng(Stream::Peers))?;
        let rate = traffic::flow_rate(sc.traffic_intensity, sc.network_rate, n);
        info!("Installing {n} flows at {rate} each");
        let template = FlowTemplate::builder()
            .rate(rate)
            .packet_size(sc.packet_size)
            .stop(sc.duration)
            .build();
        let flows = traffic::build_flows(&nodes, &addrs, &peers, template)?;
        let handles = flows
            .iter()
            .map(|flow| engine.install_flow(flow))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Running until {}", sc.duration);
        let mut per_flow = vec![Bytes::ZERO; flows.len()];
        let counter = {
            let mut observer = Tee(TxByteCounter::new(), |flow: FlowId, size: Bytes| {
                if let Some(bytes) = per_flow.get_mut(flow.inner()) {
                    *bytes += size;
                }
            });
            engine.run(sc.duration, &mut observer)?;
            observer.0
        };
        info!(
            "Sources transmitted {} packets ({})",
            counter.packets(),
            counter.total()
        );

        let mut rx = Bytes::ZERO;
        for ((flow, h), &tx) in flows.iter().zip(&handles).zip(&per_flow) {
            let flow_rx = engine.total_rx(h.sink)?;
            log_flow(flow, h, tx, flow_rx);
            rx += flow_rx;
        }
        let tx = counter.total();
        if rx > tx {
            warn!("Sinks received more bytes ({rx}) than sources transmitted ({tx})");
        }

        Ok(Report {
            protocol: sc.route_protocol.clone(),
            area: sc.area,
            nodes: n,
            tx_power: sc.tx_power,
            intensity: sc.traffic_intensity,
            tx,
            rx,
        })
    }
}

fn check_count(what: &'static str, expected: usize, actual: usize) -> Result<(), ExperimentError> {
    if expected != actual {
        return Err(ExperimentError::CountMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn log_flow(flow: &FlowSpec, handles: &FlowHandles, tx: Bytes, rx: Bytes) {
    debug!(
        "flow {} ({} -> {}, sink {}): tx {tx}, rx {rx}",
        flow.id, flow.src, flow.dst, handles.sink
    );
}

/// Experiment error.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("invalid scenario")]
    Scenario(#[from] ScenarioError),

    #[error("failed to generate traffic")]
    Traffic(#[from] TrafficError),

    #[error("engine failed")]
    Engine(#[from] EngineError),

    /// The engine returned the wrong number of nodes or addresses.
    #[error("engine created {actual} {what}, expected {expected}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{LoopbackEngine, Step},
        units::{Meters, Milliwatts},
    };

    fn scenario(node_count: usize, intensity: f64) -> Scenario {
        Scenario::builder()
            .node_count(node_count)
            .area(Meters::new(1000))
            .tx_power(Milliwatts::new(1.0))
            .traffic_intensity(intensity)
            .build()
    }

    #[test]
    fn lossless_engine_is_fully_efficient() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        let report = run(scenario(4, 0.1), &mut engine)?;
        // 25 kb/s per flow, 32 B packets: 10.24 ms apart, 488 packets each before 5 s
        assert_eq!(report.tx, Bytes::new(4 * 488 * 32));
        assert_eq!(report.rx, report.tx);
        assert_eq!(report.efficiency(), 1.0);
        Ok(())
    }

    #[test]
    fn setup_follows_engine_order() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        run(scenario(3, 0.1), &mut engine)?;
        let steps = engine.steps();
        assert_eq!(steps[0], Step::PlaceNodes(3));
        assert_eq!(steps[1], Step::InstallRadio);
        assert!(matches!(steps[2], Step::InstallRouting(Some(..))));
        assert_eq!(steps[3], Step::AssignAddresses);
        assert!(matches!(
            &steps[4..7],
            [Step::InstallFlow(..), Step::InstallFlow(..), Step::InstallFlow(..)]
        ));
        assert_eq!(steps[7], Step::Run);
        Ok(())
    }

    #[test]
    fn flows_never_target_their_source() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        run(scenario(30, 0.2), &mut engine)?;
        let flows = engine.flows();
        assert_eq!(flows.len(), 30);
        assert!(flows.iter().all(|f| f.src != f.dst));
        Ok(())
    }

    #[test]
    fn zero_intensity_transmits_nothing() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        let report = run(scenario(4, 0.0), &mut engine)?;
        assert_eq!(report.tx, Bytes::ZERO);
        assert_eq!(report.rx, Bytes::ZERO);
        assert!(report.efficiency().is_nan());
        Ok(())
    }

    #[test]
    fn lossy_engine_stays_in_range() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::delivering_every(3);
        let report = run(scenario(5, 0.1), &mut engine)?;
        let e = report.efficiency();
        assert!(report.rx <= report.tx);
        assert!((0.0..=1.0).contains(&e), "efficiency {e}");
        Ok(())
    }

    #[test]
    fn unknown_protocol_runs_without_routing() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        let sc = Scenario::builder()
            .node_count(4)
            .route_protocol("BOGUS")
            .build();
        let report = run(sc, &mut engine)?;
        assert_eq!(report.protocol, "BOGUS");
        assert_eq!(engine.steps()[2], Step::InstallRouting(None));
        Ok(())
    }

    #[test]
    fn single_node_fails_before_touching_the_engine() {
        let mut engine = LoopbackEngine::lossless();
        let res = run(scenario(1, 0.1), &mut engine);
        assert!(matches!(
            res,
            Err(ExperimentError::Scenario(ScenarioError::TooFewNodes(1)))
        ));
        assert!(engine.steps().is_empty());
    }

    #[test]
    fn same_seed_same_report() -> anyhow::Result<()> {
        let a = run(scenario(10, 0.3), &mut LoopbackEngine::delivering_every(2))?;
        let b = run(scenario(10, 0.3), &mut LoopbackEngine::delivering_every(2))?;
        assert_eq!(a.to_string(), b.to_string());
        Ok(())
    }

    #[test]
    fn engines_run_once() -> anyhow::Result<()> {
        let mut engine = LoopbackEngine::lossless();
        run(scenario(4, 0.1), &mut engine)?;
        assert!(matches!(
            run(scenario(4, 0.1), &mut engine),
            Err(ExperimentError::Engine(..))
        ));
        Ok(())
    }
}

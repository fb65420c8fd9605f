//! The `meshbench` command line.
//!
//! Scenario flags use ns-3 style names (`--nodeCount=4` or `--nodeCount 4`). A base scenario
//! can be loaded from JSON with `--scenario`; flags given explicitly override it.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use engine_impls::{DesEngine, Ns3Engine};
use meshbench_core::{
    scenario::PhyMode,
    units::{BitsPerSec, Bytes, Meters, Milliwatts, Nanosecs},
    Experiment, Report, Scenario,
};
use log::{debug, info};
use ns3_frontend::Launcher;

/// Command-line arguments.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Number of nodes [default: 20]
    #[arg(long = "nodeCount")]
    pub node_count: Option<usize>,

    /// Side of the square deployment area in meters [default: 1000]
    #[arg(long)]
    pub area: Option<Meters>,

    /// Per-node transmit power in mW [default: 1.0]
    #[arg(long = "txPower")]
    pub tx_power: Option<Milliwatts>,

    /// Routing protocol, AODV or OLSR. Anything else runs without routing [default: AODV]
    #[arg(long = "routeProtocol")]
    pub route_protocol: Option<String>,

    /// Offered load as a fraction of the network rate [default: 0.1]
    #[arg(long = "trafficIntensity", allow_negative_numbers = true)]
    pub traffic_intensity: Option<f64>,

    /// Application payload per packet in bytes [default: 32]
    #[arg(long = "packetSize")]
    pub packet_size: Option<Bytes>,

    /// Nominal network capacity in bits per second [default: 1000000]
    #[arg(long = "networkRate")]
    pub network_rate: Option<BitsPerSec>,

    /// Simulated duration in seconds [default: 5]
    #[arg(long)]
    pub duration: Option<f64>,

    /// Global random seed [default: 11223344]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run number, for independent replications under one seed [default: 1]
    #[arg(long)]
    pub run: Option<u64>,

    /// PHY data and control mode [default: DsssRate1Mbps]
    #[arg(long = "phyMode")]
    pub phy_mode: Option<PhyMode>,

    /// Fail on an unknown routing protocol instead of running without one
    #[arg(long = "strict-routing")]
    pub strict_routing: bool,

    /// JSON file with a base scenario
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// The simulation engine
    #[arg(long, value_enum, default_value_t = EngineKind::Des)]
    pub engine: EngineKind,

    /// The ns-3 source tree, required with `--engine ns3`
    #[arg(long = "ns3-dir")]
    pub ns3_dir: Option<PathBuf>,

    /// Where the ns-3 engine writes its inputs and outputs
    #[arg(long = "data-dir", default_value = "./data")]
    pub data_dir: PathBuf,

    /// The ns-3 scenario program
    #[arg(long = "ns3-program", default_value = ns3_frontend::DEFAULT_PROGRAM)]
    pub ns3_program: String,

    /// How to launch ns-3 programs, waf or ns3
    #[arg(long, default_value = "waf")]
    pub launcher: Launcher,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Line)]
    pub format: Format,
}

/// A simulation engine to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    /// The in-process discrete-event engine.
    Des,
    /// An external ns-3 program.
    Ns3,
}

/// How to print the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// `protocol,<P>,area,<A>,...` on one line.
    Line,
    /// One JSON object on one line.
    Json,
}

impl Format {
    /// Renders `report` without a trailing newline.
    pub fn render(self, report: &Report) -> anyhow::Result<String> {
        Ok(match self {
            Format::Line => report.to_string(),
            Format::Json => serde_json::to_string(report)?,
        })
    }
}

impl Args {
    /// The scenario these arguments describe: the `--scenario` file or the defaults, overridden
    /// by every flag given.
    pub fn scenario(&self) -> anyhow::Result<Scenario> {
        let mut sc = match &self.scenario {
            Some(path) => {
                debug!("Loading base scenario from {}", path.display());
                let s = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&s)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => Scenario::default(),
        };
        if let Some(n) = self.node_count {
            sc.node_count = n;
        }
        if let Some(area) = self.area {
            sc.area = area;
        }
        if let Some(power) = self.tx_power {
            sc.tx_power = power;
        }
        if let Some(protocol) = &self.route_protocol {
            sc.route_protocol = protocol.clone();
        }
        if let Some(intensity) = self.traffic_intensity {
            sc.traffic_intensity = intensity;
        }
        if let Some(size) = self.packet_size {
            sc.packet_size = size;
        }
        if let Some(rate) = self.network_rate {
            sc.network_rate = rate;
        }
        if let Some(secs) = self.duration {
            anyhow::ensure!(
                secs.is_finite() && secs > 0.0,
                "duration must be a positive number of seconds"
            );
            sc.duration = Nanosecs::from_secs_f64(secs);
        }
        if let Some(seed) = self.seed {
            sc.seed = seed;
        }
        if let Some(run) = self.run {
            sc.run = run;
        }
        if let Some(mode) = self.phy_mode {
            sc.phy_mode = mode;
        }
        if self.strict_routing {
            sc.strict_routing = true;
        }
        Ok(sc)
    }

    /// Runs the experiment on the selected engine.
    pub fn run(&self) -> anyhow::Result<Report> {
        let experiment = Experiment::new(self.scenario()?)?;
        let report = match self.engine {
            EngineKind::Des => {
                info!("Using the in-process engine");
                let mut engine = DesEngine::for_scenario(experiment.scenario());
                experiment.run(&mut engine)?
            }
            EngineKind::Ns3 => {
                let ns3_dir = self
                    .ns3_dir
                    .clone()
                    .context("--ns3-dir is required with --engine ns3")?;
                info!(
                    "Using ns-3 in {} with data in {}",
                    ns3_dir.display(),
                    self.data_dir.display()
                );
                let sc = experiment.scenario();
                let mut engine = Ns3Engine::builder()
                    .ns3_dir(ns3_dir)
                    .data_dir(self.data_dir.clone())
                    .program(self.ns3_program.clone())
                    .launcher(self.launcher)
                    .seed(sc.seed)
                    .run(sc.run)
                    .build();
                experiment.run(&mut engine)?
            }
        };
        Ok(report)
    }
}

//! An interface to the backend ns-3 simulation.
//!
//! This crate is tightly coupled to the interface of the ns-3 ad-hoc scenario program: it
//! writes the flows to a text file, runs the program with the scenario passed as command-line
//! flags, and parses the per-flow counters the program writes back.
//!
//! The program itself lives in the ns-3 tree (by default as `scratch/meshbench`). It must
//! accept these flags:
//!
//! - `--nodeCount`, `--area` (meters), `--txPowerDbm`, `--phyMode`, `--nonUnicastMode`,
//!   `--fragmentationThreshold` (bytes), `--duration` (seconds), `--RngSeed` and `--RngRun`;
//! - `--routeProtocol`, one of `AODV`, `OLSR` or `NONE` (no routing helper);
//! - `--flows=<path>`, the flow file, and `--out=<path>`, where to write the records.
//!
//! The flow file starts with the number of flows, followed by one line per flow:
//!
//! ```text
//! <id> <src> <dst> <rate bps> <packet size B> <start s> <stop s>
//! ```
//!
//! Sources and sinks are node indices; the sink for node `i` listens on UDP port 9 at the
//! `i + 1`-th host address of 10.0.0.0/8. On exit the program writes one line per flow to
//! the records file, in any order:
//!
//! ```text
//! <id> <tx packets> <tx bytes> <rx bytes>
//! ```

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use derivative::Derivative;
use meshbench_core::{
    engine::{Placement, RadioConfig},
    scenario::RouteProtocol,
    traffic::{FlowId, FlowSpec},
    units::{Bytes, Nanosecs},
};

/// The scenario program run when none is given.
pub const DEFAULT_PROGRAM: &str = "scratch/meshbench";

/// An ns-3 simulation.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Ns3Simulation {
    /// The root of the ns-3 source tree, containing `waf` or `ns3`.
    #[builder(setter(into))]
    pub ns3_dir: PathBuf,
    /// The directory in which to write simulation inputs and outputs.
    #[builder(setter(into))]
    pub data_dir: PathBuf,
    /// The scenario program, as the launcher names it.
    #[builder(default = DEFAULT_PROGRAM.to_owned(), setter(into))]
    pub program: String,
    /// How to build and run `program`.
    #[builder(default)]
    pub launcher: Launcher,
    /// Node count, area and placement seed.
    pub placement: Placement,
    /// PHY and MAC parameters.
    pub radio: RadioConfig,
    /// The routing protocol, or `None` to run without one.
    pub routing: Option<RouteProtocol>,
    /// The ns-3 global seed.
    pub seed: u64,
    /// The ns-3 run number.
    pub run: u64,
    /// Simulated time at which the run ends.
    pub stop: Nanosecs,
    /// The flows to simulate.
    pub flows: Vec<FlowSpec>,
}

impl Ns3Simulation {
    /// Run the simulation, returning one [`Ns3Record`] per flow.
    ///
    /// This routine can fail due to IO errors or errors parsing ns-3 data.
    pub fn run(&self) -> Result<Vec<Ns3Record>, Error> {
        fs::create_dir_all(&self.data_dir)?;

        // Set up the flows
        let flows = translate_flows(&self.flows);
        fs::write(self.flows_path(), flows)?;

        // Run ns-3
        self.invoke_ns3()?;

        // Parse and return results
        let s = fs::read_to_string(self.records_path())?;
        let records = parse_ns3_records(&s)?;
        Ok(records)
    }

    fn flows_path(&self) -> PathBuf {
        self.data_dir.join("flows.txt")
    }

    fn records_path(&self) -> PathBuf {
        self.data_dir.join("records.txt")
    }

    /// The program's command-line flags, in ns-3 `--name=value` form.
    fn program_args(&self, data_dir: &Path) -> Vec<String> {
        let routing = self.routing.map_or("NONE", |p| p.as_str());
        vec![
            format!("--nodeCount={}", self.placement.node_count),
            format!("--area={}", self.placement.area.into_u64()),
            format!("--txPowerDbm={}", self.radio.tx_power.into_f64()),
            format!("--routeProtocol={routing}"),
            format!("--phyMode={}", self.radio.phy_mode),
            format!("--nonUnicastMode={}", self.radio.non_unicast_mode),
            format!(
                "--fragmentationThreshold={}",
                self.radio.fragmentation_threshold.into_u64()
            ),
            format!("--duration={}", self.stop.into_secs_f64()),
            format!("--RngSeed={}", self.seed),
            format!("--RngRun={}", self.run),
            format!("--flows={}", data_dir.join("flows.txt").display()),
            format!("--out={}", data_dir.join("records.txt").display()),
        ]
    }

    fn invoke_ns3(&self) -> Result<(), Error> {
        // We need to canonicalize the directories because we run `cd` below.
        let data_dir = fs::canonicalize(&self.data_dir)?;
        let data_dir = data_dir.as_path();
        let ns3_dir = fs::canonicalize(&self.ns3_dir)?;
        let ns3_dir = ns3_dir.as_path();
        // The launcher takes the program and its flags as a single argument.
        let command = std::iter::once(self.program.clone())
            .chain(self.program_args(data_dir))
            .collect::<Vec<_>>()
            .join(" ");
        let res = match self.launcher {
            Launcher::Waf => cmd_lib::run_cmd! {
                cd ${ns3_dir};
                ./waf --run ${command} > ${data_dir}/output.txt 2>&1
            },
            Launcher::Ns3 => cmd_lib::run_cmd! {
                cd ${ns3_dir};
                ./ns3 run ${command} > ${data_dir}/output.txt 2>&1
            },
        };
        res.map_err(|source| Error::Ns3Failed {
            log: data_dir.join("output.txt"),
            source,
        })
    }
}

/// The error type for [Ns3Simulation::run].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error parsing ns-3 formats.
    #[error("failed to parse ns-3 format")]
    ParseNs3(#[from] ParseNs3Error),

    /// The ns-3 program exited unsuccessfully.
    #[error("ns-3 failed (see {})", log.display())]
    Ns3Failed {
        /// The file holding the program's output.
        log: PathBuf,
        /// The launcher's error.
        source: std::io::Error,
    },

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-flow counters written by the ns-3 program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ns3Record {
    /// The flow.
    pub id: FlowId,
    /// Packets the source transmitted.
    pub tx_packets: u64,
    /// Bytes the source transmitted.
    pub tx_bytes: Bytes,
    /// Bytes the sink received.
    pub rx_bytes: Bytes,
}

fn translate_flows(flows: &[FlowSpec]) -> String {
    let mut s = String::new();
    // First line: # of flows
    // id0 src0 dst0 rate0 (bps) packet_size0 (B) start0 (s) stop0 (s)
    // id1 src1 dst1 rate1 (bps) packet_size1 (B) start1 (s) stop1 (s)
    // The writes below cannot fail.
    let _ = writeln!(s, "{}", flows.len());
    for f in flows {
        let _ = writeln!(
            s,
            "{} {} {} {} {} {} {}",
            f.id,
            f.src,
            f.dst,
            f.rate.into_u64(),
            f.packet_size.into_u64(),
            f.start.into_secs_f64(),
            f.stop.into_secs_f64(),
        );
    }
    s
}

fn parse_ns3_records(s: &str) -> Result<Vec<Ns3Record>, ParseNs3Error> {
    s.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_ns3_record)
        .collect()
}

fn parse_ns3_record(s: &str) -> Result<Ns3Record, ParseNs3Error> {
    // id, tx_packets, tx_bytes, rx_bytes
    const NR_NS3_FIELDS: usize = 4;
    let fields = s.split_whitespace().collect::<Vec<_>>();
    let nr_fields = fields.len();
    if nr_fields != NR_NS3_FIELDS {
        return Err(ParseNs3Error::WrongNrFields {
            expected: NR_NS3_FIELDS,
            got: nr_fields,
        });
    }
    Ok(Ns3Record {
        id: fields[0].parse()?,
        tx_packets: fields[1].parse()?,
        tx_bytes: fields[2].parse()?,
        rx_bytes: fields[3].parse()?,
    })
}

/// Error parsing ns-3 formats.
#[derive(Debug, thiserror::Error)]
pub enum ParseNs3Error {
    /// Incorrect number of fields.
    #[error("wrong number of fields (expected {expected}, got {got})")]
    WrongNrFields {
        /// Expected number of fields.
        expected: usize,
        /// Actual number of fields.
        got: usize,
    },

    /// Error parsing field value.
    #[error("failed to parse field")]
    ParseInt(#[from] std::num::ParseIntError),
}

/// The tool that builds and runs ns-3 programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    /// `./waf --run`, for ns-3 releases up to 3.35.
    #[derivative(Default)]
    Waf,
    /// `./ns3 run`, for ns-3.36 and later.
    Ns3,
}

impl std::str::FromStr for Launcher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waf" => Ok(Launcher::Waf),
            "ns3" => Ok(Launcher::Ns3),
            _ => Err(format!("unknown launcher {s:?} (expected \"waf\" or \"ns3\")")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use meshbench_core::{
        engine::NodeId,
        scenario::PhyMode,
        units::{BitsPerSec, Dbm, Meters},
    };

    use super::*;

    fn flows() -> Vec<FlowSpec> {
        [(0, 0, 2), (1, 1, 0), (2, 2, 0)]
            .into_iter()
            .map(|(id, src, dst)| FlowSpec {
                id: FlowId::new(id),
                src: NodeId::new(src),
                dst: NodeId::new(dst),
                dst_addr: Ipv4Addr::new(10, 0, 0, dst as u8 + 1),
                port: 9,
                rate: BitsPerSec::new(33_333),
                packet_size: Bytes::new(32),
                start: Nanosecs::ZERO,
                stop: Nanosecs::from_millis(5_500),
            })
            .collect()
    }

    fn simulation(data_dir: &Path) -> Ns3Simulation {
        Ns3Simulation::builder()
            .ns3_dir("/opt/ns-3")
            .data_dir(data_dir)
            .placement(
                Placement::builder()
                    .node_count(3)
                    .area(Meters::new(1000))
                    .build(),
            )
            .radio(RadioConfig::builder().tx_power(Dbm::new(0.0)).build())
            .routing(Some(RouteProtocol::Olsr))
            .seed(11_223_344)
            .run(1)
            .stop(Nanosecs::from_secs(5))
            .flows(flows())
            .build()
    }

    #[test]
    fn translate_flows_correct() -> anyhow::Result<()> {
        let s = translate_flows(&flows());
        insta::assert_snapshot!(s, @r###"
        3
        0 0 2 33333 32 0 5.5
        1 1 0 33333 32 0 5.5
        2 2 0 33333 32 0 5.5
        "###);
        Ok(())
    }

    #[test]
    fn program_args_correct() -> anyhow::Result<()> {
        let sim = simulation(Path::new("/tmp/run"));
        let args = sim.program_args(Path::new("/tmp/run")).join("\n");
        insta::assert_snapshot!(args, @r###"
        --nodeCount=3
        --area=1000
        --txPowerDbm=0
        --routeProtocol=OLSR
        --phyMode=DsssRate1Mbps
        --nonUnicastMode=DsssRate1Mbps
        --fragmentationThreshold=2200
        --duration=5
        --RngSeed=11223344
        --RngRun=1
        --flows=/tmp/run/flows.txt
        --out=/tmp/run/records.txt
        "###);
        Ok(())
    }

    #[test]
    fn missing_routing_is_passed_through() {
        let mut sim = simulation(Path::new("/tmp/run"));
        sim.routing = None;
        sim.radio.phy_mode = PhyMode::DsssRate11Mbps;
        let args = sim.program_args(Path::new("/tmp/run"));
        assert!(args.contains(&"--routeProtocol=NONE".to_owned()));
        assert!(args.contains(&"--phyMode=DsssRate11Mbps".to_owned()));
    }

    #[test]
    fn parse_records_correct() -> anyhow::Result<()> {
        let records = parse_ns3_records("0 97 3104 2656\n1 97 3104 0\n\n2 96 3072 3072\n")?;
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            Ns3Record {
                id: FlowId::new(0),
                tx_packets: 97,
                tx_bytes: Bytes::new(3104),
                rx_bytes: Bytes::new(2656),
            }
        );
        assert_eq!(records[2].rx_bytes, Bytes::new(3072));
        Ok(())
    }

    #[test]
    fn parse_records_rejects_bad_lines() {
        assert!(matches!(
            parse_ns3_records("0 97 3104"),
            Err(ParseNs3Error::WrongNrFields {
                expected: 4,
                got: 3
            })
        ));
        assert!(matches!(
            parse_ns3_records("0 97 3104 -1"),
            Err(ParseNs3Error::ParseInt(..))
        ));
    }

    #[test]
    fn flows_file_is_written_before_ns3_runs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let data_dir = dir.path().join("nested");
        let mut sim = simulation(&data_dir);
        sim.ns3_dir = dir.path().join("no-such-ns3");
        // ns-3 is missing, so the run fails after writing its inputs.
        assert!(sim.run().is_err());
        let flows = fs::read_to_string(data_dir.join("flows.txt"))?;
        assert!(flows.starts_with("3\n0 0 2 "));
        Ok(())
    }
}

use clap::Parser;
use meshbench::{
    core::{
        units::{Meters, Milliwatts},
        Experiment, Scenario,
    },
    impls::DesEngine,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of nodes
    #[arg(short, long, default_value_t = 20)]
    nodes: usize,

    /// Side of the deployment area in meters
    #[arg(short, long, default_value = "1000")]
    area: Meters,

    /// Transmit power in mW
    #[arg(short, long, default_value_t = 1.0)]
    tx_power: f64,

    /// Routing protocols to compare
    #[arg(short, long, value_delimiter = ',', default_value = "AODV,OLSR")]
    protocols: Vec<String>,

    /// Traffic intensities to sweep
    #[arg(short, long, value_delimiter = ',', default_value = "0.05,0.1,0.2,0.4,0.8")]
    intensities: Vec<f64>,

    /// Independent runs per point
    #[arg(short, long, default_value_t = 3)]
    runs: u64,

    /// Random seed
    #[arg(short, long, default_value_t = 11_223_344)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    anyhow::ensure!(args.nodes >= 2, "nodes must be at least 2");
    anyhow::ensure!(args.runs > 0, "runs must be positive");
    anyhow::ensure!(
        args.intensities.iter().all(|i| i.is_finite() && *i >= 0.0),
        "intensities must be non-negative"
    );

    for protocol in &args.protocols {
        for &intensity in &args.intensities {
            let mut efficiencies = Vec::new();
            for run in 1..=args.runs {
                let scenario = Scenario::builder()
                    .node_count(args.nodes)
                    .area(args.area)
                    .tx_power(Milliwatts::new(args.tx_power))
                    .route_protocol(protocol.as_str())
                    .traffic_intensity(intensity)
                    .seed(args.seed)
                    .run(run)
                    .build();
                let experiment = Experiment::new(scenario)?;
                let mut engine = DesEngine::for_scenario(experiment.scenario());
                let report = experiment.run(&mut engine)?;
                println!("{report}");
                efficiencies.push(report.efficiency());
            }
            // NaN runs (nothing sent) don't count towards the mean
            let valid = efficiencies
                .iter()
                .copied()
                .filter(|e| !e.is_nan())
                .collect::<Vec<_>>();
            if !valid.is_empty() {
                let mean = valid.iter().sum::<f64>() / valid.len() as f64;
                eprintln!(
                    "{protocol} at {intensity}: mean efficiency {mean:.4} over {} runs",
                    valid.len()
                );
            }
        }
    }
    Ok(())
}

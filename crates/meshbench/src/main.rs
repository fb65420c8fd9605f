use clap::Parser;
use meshbench::cli::Args;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_module_path(false)
        .init();
    let args = Args::parse();
    let report = args.run()?;
    println!("{}", args.format.render(&report)?);
    Ok(())
}

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

mod commands;
mod pacing;
mod settings;

use commands::adc::AdcArgs;
use commands::buffer::BufferArgs;
use commands::telemetry::TelemetryArgs;
use settings::SimulationConfig;

/// Cordon Command Line Interface
///
/// Runs worker simulations against the cordon coordination primitives.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// TOML file with simulation settings
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[clap(long, global = true)]
    json: bool,

    /// Lower bound of the random pause between device uses (ms)
    #[clap(long, global = true)]
    delay_min_ms: Option<u64>,

    /// Upper bound of the random pause between device uses (ms)
    #[clap(long, global = true)]
    delay_max_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Workers take turns sampling one shared device
    Adc(AdcArgs),

    /// Workers sample the device, then transmit blocks over a pool of links
    Telemetry(TelemetryArgs),

    /// Producers and consumers share a bounded buffer
    Buffer(BufferArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_settings(cli: &Cli) -> Result<SimulationConfig> {
    let mut settings = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };

    if let Some(max) = cli.delay_max_ms {
        settings.delay_max_ms = max;
        settings.delay_min_ms = settings.delay_min_ms.min(max);
    }
    if let Some(min) = cli.delay_min_ms {
        settings.delay_min_ms = min;
    }

    match &cli.command {
        Commands::Adc(args) => args.apply(&mut settings),
        Commands::Telemetry(args) => args.apply(&mut settings),
        Commands::Buffer(args) => args.apply(&mut settings),
    }

    settings.validate()?;
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Adc(_) => commands::emit(&commands::adc::run(&settings)?, cli.json),
        Commands::Telemetry(_) => commands::emit(&commands::telemetry::run(&settings)?, cli.json),
        Commands::Buffer(_) => commands::emit(&commands::buffer::run(&settings)?, cli.json),
    }
}

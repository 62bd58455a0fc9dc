use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ublox_fusion::{
    components::{
        config::GpsConfig, fusion::FixFusionEngine, rate_monitor::FixRateMonitor,
    },
    core::time::{Clock, SimulatedClock},
    parameters::{ParameterMap, parse_string},
    replay::{self, ReplayLog},
};

/// Replays recorded receiver reports through the navigation fusion core.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Recorded reports (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Parameter file
    #[arg(short, long, default_value = "config/params.toml")]
    params: PathBuf,

    /// Write fused fixes and velocities to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();

    let params_str = fs::read_to_string(&args.params)
        .with_context(|| format!("Could not read parameters from {}", args.params.display()))?;
    let params = parse_string(params_str)?;

    let gps_params = if params.contains_key("gps") {
        params.get_map("gps")?.clone()
    } else {
        ParameterMap::default()
    };
    let config = GpsConfig::resolve(&gps_params)?;
    info!("Measurement period {} ms", config.meas_rate_ms());

    let log = ReplayLog::load(&args.input)
        .with_context(|| format!("Could not load replay log {}", args.input.display()))?;

    let monitor = FixRateMonitor::new(config.fix_frequency_hz());
    let mut engine =
        FixFusionEngine::new(config.frame_id.clone()).with_tick_sink(Box::new(monitor.clone()));
    let mut clock = SimulatedClock::default();

    let summary = match &args.output {
        Some(path) => {
            let mut writer = csv::Writer::from_path(path)?;
            replay::run(&log, &mut engine, &mut clock, &config.publish, Some(&mut writer))?
        }
        None => replay::run::<std::io::Sink>(&log, &mut engine, &mut clock, &config.publish, None)?,
    };

    info!(
        "Replayed {} positions, {} velocities ({} sharing their epoch's timestamp), {} solutions",
        summary.positions, summary.velocities, summary.correlated, summary.solutions
    );

    println!("{}", engine.diagnostic());
    println!("{}", monitor.status(clock.monotonic()));

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use telematics_analyzer::{charts, loader, report, AnalyzerConfig, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "telematics_analyzer")]
#[command(about = "Detect overspeeding, harsh braking and idling in a trip's telemetry CSV", long_about = None)]
struct Args {
    /// Path to telematics CSV file (.csv or .csv.gz)
    #[arg(long)]
    input: PathBuf,

    /// Output directory
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// JSON file with analyzer settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Speed limit (km/h)
    #[arg(long)]
    speed_limit: Option<f64>,

    /// Harsh braking threshold (m/s², negative)
    #[arg(long, allow_hyphen_values = true)]
    decel_threshold: Option<f64>,

    /// Minimum idle duration (seconds)
    #[arg(long)]
    idle_time: Option<f64>,

    /// Run the three detectors on separate threads
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Skip the HTML charts
    #[arg(long, default_value_t = false)]
    no_charts: bool,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = build_config(&args)?;
    info!("Settings: {:?}", config);

    let samples = loader::load_samples(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;

    let analysis = Pipeline::new(&config).run(&samples);
    let summary = analysis.summary();

    println!("Overspeed events: {}", summary.overspeed_count);
    println!("Harsh braking events: {}", summary.harsh_braking_count);
    println!("Idling events: {}", summary.idle_count);

    report::write_report(&args.out, &analysis)
        .with_context(|| format!("failed to write report to {}", args.out.display()))?;

    if !args.no_charts {
        charts::write_charts(&args.out, &analysis.series)
            .with_context(|| format!("failed to write charts to {}", args.out.display()))?;
    }

    println!("Results saved to {}", args.out.display());
    Ok(())
}

fn build_config(args: &Args) -> Result<AnalyzerConfig> {
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    if let Some(limit) = args.speed_limit {
        config.speed_limit_kmh = limit;
    }
    if let Some(threshold) = args.decel_threshold {
        config.decel_threshold_mps2 = threshold;
    }
    if let Some(idle) = args.idle_time {
        config.idle_time_sec = idle;
    }
    if args.parallel {
        config.parallel_detectors = true;
    }
    Ok(config)
}

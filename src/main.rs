use anyhow::Context;
use clap::Parser;
use embassy_futures::block_on;
use embassy_futures::select::{Either, select};
use embassy_time::Instant;
use env_logger::Builder;
use log::{LevelFilter, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rf_coverage_simulator::common::config::RunnerConfig;
use rf_coverage_simulator::common::scene::load_scene;
use rf_coverage_simulator::connection::ConnectionManager;
use rf_coverage_simulator::export::{MeasurementRecorder, evaluate, export_csv};
use rf_coverage_simulator::propagation::signal_calculations::free_space_range_m;
use rf_coverage_simulator::propagation::{ObstacleService, PropagationEngine};
use rf_coverage_simulator::simulation::{EngineCommandChannel, coverage_task, script_task};
use rf_coverage_simulator::time_driver;

/// Headless RF coverage and handover simulator
#[derive(Parser, Debug)]
#[command(name = "rf-coverage-simulator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the scene JSON file
    scene: String,

    /// Runner configuration (default: config.toml next to the scene)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of decision passes, overriding the config
    #[arg(long)]
    ticks: Option<u32>,

    /// Shadowing seed, overriding the config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Simulated-time speed in percent of wall-clock time
    #[arg(long)]
    speed: Option<u32>,

    /// CSV output path, overriding the config
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> anyhow::Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::load_or_default(&RunnerConfig::config_path_from_scene(&cli.scene))?,
    };
    if let Some(ticks) = cli.ticks {
        config.ticks = ticks;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(speed) = cli.speed {
        config.speed_percent = speed;
    }
    if let Some(csv) = &cli.csv {
        config.export.csv_path = Some(csv.clone());
    }
    config.validate().context("Invalid command line overrides")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("rf_coverage_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    info!("Starting up");

    let scene = load_scene(&cli.scene).with_context(|| format!("Failed to load scene {}", cli.scene))?;
    let config = load_config(&cli)?;
    time_driver::set_speed_percent(config.speed_percent);

    let obstacles = scene.building_layer().map(|layer| {
        info!("Obstacle layer: {} buildings", layer.buildings().len());
        Arc::new(layer) as Arc<dyn ObstacleService>
    });
    let engine = PropagationEngine::new(obstacles, config.propagation.clone());
    let mut manager = ConnectionManager::new(engine, config.connection.clone(), config.strategy).with_shadowing_seed(config.seed);
    for tx in scene.transmitters() {
        let id = tx.id;
        info!(
            "Transmitter {}: {:.0} MHz, {:.1} dBm EIRP, free-space range {:.0} m",
            id,
            tx.frequency_mhz,
            tx.eirp_dbm(),
            free_space_range_m(tx.eirp_dbm(), config.connection.min_signal_dbm, tx.frequency_mhz)
        );
        if !manager.add_transmitter(tx) {
            warn!("Transmitter {} already registered, skipped", id);
        }
    }
    for rx in scene.receivers() {
        let id = rx.id;
        if !manager.add_receiver(rx) {
            warn!("Receiver {} already registered, skipped", id);
        }
    }

    let scenario = config
        .scenario_name
        .clone()
        .or_else(|| scene.scenario_name.clone())
        .or_else(|| Path::new(&cli.scene).file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "scenario".to_string());
    let mut recorder = MeasurementRecorder::new(scenario);

    let channel = EngineCommandChannel::new();
    let start = Instant::now();
    let summary = block_on(async {
        match select(
            coverage_task(&mut manager, channel.receiver(), &config, &mut recorder),
            script_task(scene.events.clone(), channel.sender(), start, config.run_length()),
        )
        .await
        {
            Either::First(summary) => summary,
            Either::Second(never) => match never {},
        }
    });

    let wall_clock = summary.finished_at - summary.started_at;
    info!(
        "Run '{}' finished in {:.2}s: {} ticks, {} commands, {} handovers",
        recorder.scenario(),
        wall_clock.num_milliseconds() as f64 / 1000.0,
        summary.ticks,
        summary.commands,
        summary.handovers
    );
    info!("Final state: {}", summary.final_statistics);
    for snapshot in manager.snapshots() {
        match snapshot.connected_transmitter {
            Some(tx) => info!(
                "Receiver {} -> transmitter {}: {:.1} dBm, SINR {:.1} dB, {}",
                snapshot.receiver_id,
                tx,
                snapshot.signal_dbm,
                snapshot.sinr_db,
                snapshot.quality.map(|q| q.to_string()).unwrap_or_else(|| "unrated".to_string())
            ),
            None => info!("Receiver {} unconnected", snapshot.receiver_id),
        }
    }

    if config.export.evaluation {
        for evaluation in evaluate(recorder.records()) {
            info!("{}", evaluation);
        }
    }
    if let Some(path) = &config.export.csv_path {
        export_csv(path, recorder.records())?;
    }

    Ok(())
}

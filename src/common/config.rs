//! Runner configuration loaded from TOML.
//!
//! Every table is optional; missing keys fall back to defaults, so an empty
//! file (or no file at all) is a valid configuration.

use anyhow::{Context, bail};
use embassy_time::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::connection::{ConnectionSettings, StrategyKind};
use crate::propagation::engine::PropagationSettings;

/// Where and how measurement tables are written.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// CSV output file. No path disables the export.
    pub csv_path: Option<PathBuf>,
    /// Record every tick instead of only the final state.
    pub record_every_tick: bool,
    /// Log per-model evaluation metrics at the end of the run.
    pub evaluation: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            record_every_tick: false,
            evaluation: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Overrides the scene's scenario name in exported tables.
    pub scenario_name: Option<String>,
    /// Decision passes per second of simulated time.
    pub update_frequency_hz: f64,
    /// Number of passes before the run stops.
    pub ticks: u32,
    /// Simulated-time speed in percent of wall-clock time.
    pub speed_percent: u32,
    pub strategy: StrategyKind,
    /// Seed of the shadowing samples.
    pub seed: u64,
    pub connection: ConnectionSettings,
    pub propagation: PropagationSettings,
    pub export: ExportConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenario_name: None,
            update_frequency_hz: 1.0,
            ticks: 10,
            speed_percent: 100,
            strategy: StrategyKind::default(),
            seed: 0,
            connection: ConnectionSettings::default(),
            propagation: PropagationSettings::default(),
            export: ExportConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path).with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", config_path.display()))
    }

    /// Load the file if it exists, otherwise use defaults.
    pub fn load_or_default(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: RunnerConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.update_frequency_hz > 0.0) || !self.update_frequency_hz.is_finite() {
            bail!("update_frequency_hz must be positive, got {}", self.update_frequency_hz);
        }
        if self.ticks == 0 {
            bail!("ticks must be at least 1");
        }
        if self.speed_percent == 0 {
            bail!("speed_percent must be at least 1");
        }
        let c = &self.connection;
        if c.handover_margin_db < 0.0 || c.connection_margin_db < 0.0 || c.emergency_threshold_relief_db < 0.0 {
            bail!("connection margins must be non-negative");
        }
        if c.emergency_hysteresis_multiplier < 1.0 {
            bail!("emergency_hysteresis_multiplier must be at least 1");
        }
        if c.good_signal_dbm > c.excellent_signal_dbm {
            bail!(
                "good_signal_dbm {} must not exceed excellent_signal_dbm {}",
                c.good_signal_dbm,
                c.excellent_signal_dbm
            );
        }
        let p = &self.propagation.path_loss;
        if !(p.path_loss_exponent > 0.0) {
            bail!("path_loss_exponent must be positive");
        }
        if p.shadowing_sigma < 0.0 {
            bail!("shadowing_sigma must be non-negative");
        }
        Ok(())
    }

    /// Interval between decision passes.
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(((1_000_000.0 / self.update_frequency_hz).round() as u64).max(1))
    }

    /// Simulated time from the first tick to the last.
    pub fn run_length(&self) -> Duration {
        self.tick_period() * self.ticks.saturating_sub(1)
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }
}

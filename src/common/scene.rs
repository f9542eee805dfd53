//! Scene loading, parsing, and validation logic.
//!
//! A scene is a JSON document describing transmitters, receivers, buildings
//! (with material presets or named overrides) and an optional script of
//! timed events replayed while the coverage task runs.

use anyhow::Context;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;

use crate::connection::StrategyKind;
use crate::propagation::geometry::{Building, BuildingLayer, DEFAULT_OBSTACLE_LAYER};
use crate::propagation::materials::{BuildingMaterial, MaterialType, material_for};
use crate::propagation::types::{PropagationModel, Receiver, ReceiverId, Technology, Transmitter, TransmitterId, Vec3};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

fn default_sensitivity() -> f64 {
    -110.0
}

fn default_floors() -> u32 {
    1
}

fn default_layer() -> u32 {
    DEFAULT_OBSTACLE_LAYER
}

/// Transmitter entry. Either `frequency_mhz` or `technology` must be present;
/// an explicit frequency wins.
#[derive(Debug, Deserialize, Clone)]
pub struct TransmitterSpec {
    pub id: TransmitterId,
    pub position: Vec3,
    pub tx_power_dbm: f64,
    #[serde(default)]
    pub antenna_gain_dbi: f64,
    #[serde(default)]
    pub frequency_mhz: Option<f64>,
    #[serde(default)]
    pub technology: Option<Technology>,
    /// Falls back to the scene's `default_model`.
    #[serde(default)]
    pub model: Option<PropagationModel>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverSpec {
    pub id: ReceiverId,
    pub position: Vec3,
    #[serde(default = "default_sensitivity")]
    pub sensitivity_dbm: f64,
}

/// Material reference of a building: a preset name or a key into the
/// scene's `materials` table.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MaterialSpec {
    Preset(MaterialType),
    Named(String),
}

/// Custom material: a preset with some properties replaced.
#[derive(Debug, Deserialize, Clone)]
pub struct MaterialOverride {
    pub base: MaterialType,
    #[serde(default)]
    pub relative_permittivity: Option<f64>,
    #[serde(default)]
    pub conductivity_coefficient: Option<f64>,
    #[serde(default)]
    pub conductivity_exponent: Option<f64>,
    #[serde(default)]
    pub surface_roughness_m: Option<f64>,
    #[serde(default)]
    pub scatter_albedo: Option<f64>,
    #[serde(default)]
    pub penetration_loss_db_per_m: Option<f64>,
    #[serde(default)]
    pub wall_thickness_m: Option<f64>,
}

impl MaterialOverride {
    pub fn build(&self) -> BuildingMaterial {
        let mut m = material_for(self.base);
        if let Some(v) = self.relative_permittivity {
            m.relative_permittivity = v;
        }
        if let Some(v) = self.conductivity_coefficient {
            m.conductivity_coefficient = v;
        }
        if let Some(v) = self.conductivity_exponent {
            m.conductivity_exponent = v;
        }
        if let Some(v) = self.surface_roughness_m {
            m.surface_roughness_m = v;
        }
        if let Some(v) = self.scatter_albedo {
            m.scatter_albedo = v;
        }
        if let Some(v) = self.penetration_loss_db_per_m {
            m.penetration_loss_db_per_m = v;
        }
        if let Some(v) = self.wall_thickness_m {
            m.wall_thickness_m = v;
        }
        m
    }
}

/// Axis-aligned building given by two opposite corners.
#[derive(Debug, Deserialize, Clone)]
pub struct BuildingSpec {
    pub id: u32,
    pub min: Vec3,
    pub max: Vec3,
    /// No material means the building blocks LOS but adds no penetration loss.
    #[serde(default)]
    pub material: Option<MaterialSpec>,
    #[serde(default = "default_floors")]
    pub floors: u32,
    #[serde(default = "default_layer")]
    pub layer: u32,
}

/// What a script event does.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "action")]
pub enum ScriptAction {
    #[serde(rename = "move_transmitter")]
    MoveTransmitter { id: TransmitterId, position: Vec3 },
    #[serde(rename = "move_receiver")]
    MoveReceiver { id: ReceiverId, position: Vec3 },
    #[serde(rename = "set_strategy")]
    SetStrategy { strategy: StrategyKind },
}

/// Timed event, `at_s` seconds after the run starts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScriptEvent {
    pub at_s: f64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize)]
pub struct Scene {
    /// Label written to exported tables.
    #[serde(default)]
    pub scenario_name: Option<String>,
    #[serde(default)]
    pub default_model: PropagationModel,
    pub transmitters: Vec<TransmitterSpec>,
    pub receivers: Vec<ReceiverSpec>,
    #[serde(default)]
    pub buildings: Vec<BuildingSpec>,
    #[serde(default)]
    pub materials: HashMap<String, MaterialOverride>,
    /// Obstacle layer filter. `0` disables obstacles entirely.
    #[serde(default)]
    pub obstacle_layer_mask: Option<u32>,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

impl Scene {
    pub fn transmitters(&self) -> Vec<Transmitter> {
        self.transmitters
            .iter()
            .map(|t| Transmitter {
                id: t.id,
                position: t.position,
                tx_power_dbm: t.tx_power_dbm,
                antenna_gain_dbi: t.antenna_gain_dbi,
                frequency_mhz: t.frequency_mhz.or(t.technology.map(|tech| tech.carrier_frequency_mhz())).unwrap_or(f64::NAN),
                model: t.model.unwrap_or(self.default_model),
                technology: t.technology,
            })
            .collect()
    }

    pub fn receivers(&self) -> Vec<Receiver> {
        self.receivers.iter().map(|r| Receiver::new(r.id, r.position, r.sensitivity_dbm)).collect()
    }

    fn resolve_material(&self, spec: &MaterialSpec) -> Option<BuildingMaterial> {
        match spec {
            MaterialSpec::Preset(material_type) => Some(material_for(*material_type)),
            MaterialSpec::Named(name) => self.materials.get(name).map(MaterialOverride::build),
        }
    }

    /// Obstacle layer built from the scene buildings.
    ///
    /// `None` when there are no buildings or the layer mask is `0`; the
    /// propagation engine then treats every path as clear. Buildings sharing a
    /// material reference share one `Arc`.
    pub fn building_layer(&self) -> Option<BuildingLayer> {
        let mask = self.obstacle_layer_mask.unwrap_or(u32::MAX);
        if self.buildings.is_empty() || mask == 0 {
            return None;
        }
        let mut shared: Vec<(MaterialSpec, Arc<BuildingMaterial>)> = Vec::new();
        let buildings = self
            .buildings
            .iter()
            .map(|b| {
                let material = b.material.as_ref().and_then(|spec| {
                    if let Some((_, arc)) = shared.iter().find(|(s, _)| s == spec) {
                        return Some(arc.clone());
                    }
                    let arc = Arc::new(self.resolve_material(spec)?);
                    shared.push((spec.clone(), arc.clone()));
                    Some(arc)
                });
                let mut building = Building::new(b.id, b.min, b.max, material);
                building.floors = b.floors;
                building.layer = b.layer;
                building
            })
            .collect();
        Some(BuildingLayer::new(buildings).with_layer_mask(mask))
    }
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    parse_scene(&data)
}

/// Parse and validate a scene from a JSON string.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

fn finite_position(p: &Vec3) -> bool {
    const MAX_WORLD_COORD: f64 = 100_000.0;
    [p.x, p.y, p.z].iter().all(|c| c.is_finite() && c.abs() <= MAX_WORLD_COORD)
}

/// Validate scene configuration.
///
/// Checks for common issues that would cause runtime problems:
/// - Empty scenes or excessive entity counts
/// - Duplicate transmitter, receiver or building ids
/// - Positions that are not finite or lie outside the world bounds
/// - Missing or non-positive carrier frequencies
/// - Inverted or flat building boxes, unknown material names
/// - Script events referencing unknown entities
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_ENTITIES: usize = 10000;
    const MIN_TX_POWER: f64 = -50.0;
    const MAX_TX_POWER: f64 = 80.0;

    if scene.transmitters.is_empty() {
        return Err("Scene must contain at least one transmitter".to_string());
    }
    if scene.receivers.is_empty() {
        return Err("Scene must contain at least one receiver".to_string());
    }
    if scene.transmitters.len() > MAX_ENTITIES || scene.receivers.len() > MAX_ENTITIES || scene.buildings.len() > MAX_ENTITIES {
        return Err(format!("Entity count exceeds maximum of {} per kind", MAX_ENTITIES));
    }

    let mut tx_ids = HashSet::new();
    for tx in &scene.transmitters {
        if !tx_ids.insert(tx.id) {
            return Err(format!("Duplicate transmitter id found: {}", tx.id));
        }
        if !finite_position(&tx.position) {
            return Err(format!("Transmitter {} position is outside the world bounds", tx.id));
        }
        if !(MIN_TX_POWER..=MAX_TX_POWER).contains(&tx.tx_power_dbm) {
            return Err(format!(
                "Transmitter {} tx_power_dbm {} outside realistic range ({} to {} dBm)",
                tx.id, tx.tx_power_dbm, MIN_TX_POWER, MAX_TX_POWER
            ));
        }
        if !tx.antenna_gain_dbi.is_finite() {
            return Err(format!("Transmitter {} antenna_gain_dbi must be finite", tx.id));
        }
        match (tx.frequency_mhz, tx.technology) {
            (Some(f), _) if !(f > 0.0) || !f.is_finite() => {
                return Err(format!("Transmitter {} frequency_mhz {} must be positive", tx.id, f));
            }
            (None, None) => {
                return Err(format!("Transmitter {} needs either 'frequency_mhz' or 'technology'", tx.id));
            }
            _ => {}
        }
    }

    let mut rx_ids = HashSet::new();
    for rx in &scene.receivers {
        if !rx_ids.insert(rx.id) {
            return Err(format!("Duplicate receiver id found: {}", rx.id));
        }
        if !finite_position(&rx.position) {
            return Err(format!("Receiver {} position is outside the world bounds", rx.id));
        }
        if !rx.sensitivity_dbm.is_finite() {
            return Err(format!("Receiver {} sensitivity_dbm must be finite", rx.id));
        }
    }

    for (name, material) in &scene.materials {
        let m = material.build();
        if !(0.0..=1.0).contains(&m.scatter_albedo) {
            return Err(format!("Material '{}' scatter_albedo {} must be within 0-1", name, m.scatter_albedo));
        }
        if m.surface_roughness_m < 0.0 || m.wall_thickness_m < 0.0 || m.penetration_loss_db_per_m < 0.0 {
            return Err(format!("Material '{}' has negative roughness, thickness or penetration loss", name));
        }
        if !(m.relative_permittivity >= 1.0) {
            return Err(format!("Material '{}' relative_permittivity must be at least 1", name));
        }
    }

    let mut building_ids = HashSet::new();
    for b in &scene.buildings {
        if !building_ids.insert(b.id) {
            return Err(format!("Duplicate building id found: {}", b.id));
        }
        if !finite_position(&b.min) || !finite_position(&b.max) {
            return Err(format!("Building {} corners are outside the world bounds", b.id));
        }
        if b.min.x >= b.max.x || b.min.y >= b.max.y || b.min.z >= b.max.z {
            return Err(format!(
                "Building {} has invalid geometry: min ({}, {}, {}) must be strictly less than max ({}, {}, {})",
                b.id, b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
            ));
        }
        if let Some(MaterialSpec::Named(name)) = &b.material {
            if !scene.materials.contains_key(name) {
                return Err(format!("Building {} references unknown material '{}'", b.id, name));
            }
        }
    }

    for (idx, event) in scene.events.iter().enumerate() {
        if !(event.at_s >= 0.0) || !event.at_s.is_finite() {
            return Err(format!("Event {} has invalid time {}", idx, event.at_s));
        }
        match &event.action {
            ScriptAction::MoveTransmitter { id, position } => {
                if !tx_ids.contains(id) {
                    return Err(format!("Event {} moves unknown transmitter {}", idx, id));
                }
                if !finite_position(position) {
                    return Err(format!("Event {} moves transmitter {} outside the world bounds", idx, id));
                }
            }
            ScriptAction::MoveReceiver { id, position } => {
                if !rx_ids.contains(id) {
                    return Err(format!("Event {} moves unknown receiver {}", idx, id));
                }
                if !finite_position(position) {
                    return Err(format!("Event {} moves receiver {} outside the world bounds", idx, id));
                }
            }
            ScriptAction::SetStrategy { .. } => {}
        }
    }

    Ok(())
}

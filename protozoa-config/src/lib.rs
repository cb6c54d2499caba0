use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_WORLD_CONFIG_REL_PATH: &str = "default.toml";

/// Every tunable the simulation reads. Health changes are fractions of an
/// organism's size unless noted otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldConfig {
    pub grid_units_wide: u32,
    pub grid_units_high: u32,

    pub initial_organisms: u32,
    pub initial_food: u32,
    pub chance_to_add_organism: f32,
    pub chance_to_add_food_item: f32,
    pub max_food_value: u32,
    pub min_food_value: u32,
    pub min_ph: f32,
    pub max_ph: f32,
    pub initial_ph: f32,

    pub max_organisms: u32,
    pub max_cycles_between_spawns: u32,
    pub min_spawn_health: f32,
    pub max_spawn_health_percent: f32,
    pub min_chance_to_mutate_decision_tree: f32,
    pub max_chance_to_mutate_decision_tree: f32,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f32,
    pub minimum_max_size: f32,
    pub maximum_max_size: f32,
    pub min_ph_tolerance: f32,
    pub max_ph_tolerance: f32,
    pub min_ph_tolerance_range: f32,
    pub max_ph_tolerance_range: f32,
    #[serde(default)]
    pub min_change_to_ph: f32,
    #[serde(default)]
    pub max_change_to_ph: f32,

    /// Upper bound on node count for any tree, and the step cap for evaluation.
    pub max_decision_tree_size: u32,
    #[serde(default = "default_chance_of_action_at_generation")]
    pub chance_of_action_at_generation: f32,
    /// Upper bound for the per-organism number of cycles a tree is scored before
    /// its usage statistics are trusted.
    #[serde(default = "default_max_cycles_to_evaluate_decision_tree")]
    pub max_cycles_to_evaluate_decision_tree: u32,

    pub health_change_per_cycle: f32,
    pub health_change_from_being_idle: f32,
    pub health_change_from_turning: f32,
    pub health_change_from_moving: f32,
    pub health_change_from_eating_attempt: f32,
    pub health_change_from_attacking: f32,
    pub health_change_inflicted_by_attack: f32,
    pub health_change_from_feeding: f32,
    #[serde(default)]
    pub health_change_per_decision_tree_node: f32,
    #[serde(default)]
    pub health_change_from_unhealthy_ph: f32,
}

impl WorldConfig {
    pub fn world_capacity(&self) -> usize {
        self.grid_units_wide as usize * self.grid_units_high as usize
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        default_world_config()
    }
}

pub fn world_config_from_toml_str(raw: &str) -> Result<WorldConfig, toml::de::Error> {
    toml::from_str(raw)
}

pub fn default_world_config() -> WorldConfig {
    world_config_from_toml_str(include_str!("../default.toml"))
        .expect("default world config TOML must deserialize")
}

pub fn default_world_config_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_WORLD_CONFIG_REL_PATH)
}

pub fn load_default_world_config() -> Result<WorldConfig> {
    load_world_config_from_path(&default_world_config_path())
}

pub fn load_world_config_from_path(path: &Path) -> Result<WorldConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read world config from {}", path.display()))?;
    world_config_from_toml_str(&raw)
        .context("world config TOML failed schema deserialization")
        .with_context(|| format!("failed to parse world config from {}", path.display()))
}

pub fn validate_world_config(config: &WorldConfig) -> Result<(), String> {
    if config.grid_units_wide == 0 || config.grid_units_high == 0 {
        return Err("grid_units_wide and grid_units_high must be greater than zero".to_owned());
    }
    if config.max_organisms == 0 {
        return Err("max_organisms must be greater than zero".to_owned());
    }
    for (name, value) in [
        ("chance_to_add_organism", config.chance_to_add_organism),
        ("chance_to_add_food_item", config.chance_to_add_food_item),
        (
            "chance_of_action_at_generation",
            config.chance_of_action_at_generation,
        ),
        (
            "min_chance_to_mutate_decision_tree",
            config.min_chance_to_mutate_decision_tree,
        ),
        (
            "max_chance_to_mutate_decision_tree",
            config.max_chance_to_mutate_decision_tree,
        ),
        ("max_spawn_health_percent", config.max_spawn_health_percent),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("{name} must be within [0, 1]"));
        }
    }
    if config.min_chance_to_mutate_decision_tree > config.max_chance_to_mutate_decision_tree {
        return Err(
            "min_chance_to_mutate_decision_tree must be <= max_chance_to_mutate_decision_tree"
                .to_owned(),
        );
    }
    if config.min_food_value > config.max_food_value {
        return Err("min_food_value must be <= max_food_value".to_owned());
    }
    if config.min_ph > config.max_ph {
        return Err("min_ph must be <= max_ph".to_owned());
    }
    if !(config.min_ph..=config.max_ph).contains(&config.initial_ph) {
        return Err("initial_ph must lie within [min_ph, max_ph]".to_owned());
    }
    if config.minimum_max_size <= 0.0 || config.minimum_max_size > config.maximum_max_size {
        return Err("minimum_max_size must be positive and <= maximum_max_size".to_owned());
    }
    if config.min_spawn_health <= 0.0 {
        return Err("min_spawn_health must be greater than zero".to_owned());
    }
    if config.growth_factor < 0.0 {
        return Err("growth_factor must be >= 0".to_owned());
    }
    if config.max_decision_tree_size == 0 {
        return Err("max_decision_tree_size must be >= 1".to_owned());
    }
    if config.max_cycles_to_evaluate_decision_tree == 0 {
        return Err("max_cycles_to_evaluate_decision_tree must be >= 1".to_owned());
    }
    if config.min_ph_tolerance > config.max_ph_tolerance {
        return Err("min_ph_tolerance must be <= max_ph_tolerance".to_owned());
    }
    if config.min_ph_tolerance_range < 0.0
        || config.min_ph_tolerance_range > config.max_ph_tolerance_range
    {
        return Err("ph tolerance ranges must be non-negative and ordered".to_owned());
    }
    if config.min_change_to_ph > config.max_change_to_ph {
        return Err("min_change_to_ph must be <= max_change_to_ph".to_owned());
    }
    Ok(())
}

fn default_growth_factor() -> f32 {
    0.5
}

fn default_chance_of_action_at_generation() -> f32 {
    0.5
}

fn default_max_cycles_to_evaluate_decision_tree() -> u32 {
    100
}

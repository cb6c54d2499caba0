use protozoa_config::validate_world_config;
use protozoa_types::{
    ChampionInfo, MetricsSnapshot, OrganismId, OrganismState, Point, TickDelta, WorldConfig,
    WorldSnapshot,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod decision;
pub mod evaluate;
mod grid;
pub mod organism;
mod spawn;
mod turn;
pub mod world;

#[cfg(test)]
mod tests;

pub use decision::DecisionError;
pub use world::{Environment, FoodGrid, FoodService, PhGrid};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid world config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error("failed to serialize world snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The population manager: owns every organism, the occupancy index and the
/// decide/resolve schedule, and acts on the food and pH collaborators.
#[derive(Debug)]
pub struct Simulation {
    config: WorldConfig,
    cycle: u64,
    seed: u64,
    rng: ChaCha8Rng,
    next_organism_id: u64,
    organisms: BTreeMap<OrganismId, OrganismState>,
    occupancy: Vec<Option<OrganismId>>,
    update_order: Vec<OrganismId>,
    new_organism_ids: Vec<OrganismId>,
    lineage_counts: BTreeMap<OrganismId, u32>,
    best_current: ChampionInfo,
    best_all_time: ChampionInfo,
    food: Box<dyn FoodService>,
    environment: Box<dyn Environment>,
    metrics: MetricsSnapshot,
}

impl Simulation {
    /// Builds a world backed by the dense food and pH grids.
    pub fn new(config: WorldConfig, seed: u64) -> Result<Self, SimError> {
        let food = Box::new(FoodGrid::new(&config));
        let environment = Box::new(PhGrid::new(&config));
        Self::with_collaborators(config, seed, food, environment)
    }

    pub fn with_collaborators(
        config: WorldConfig,
        seed: u64,
        food: Box<dyn FoodService>,
        environment: Box<dyn Environment>,
    ) -> Result<Self, SimError> {
        validate_world_config(&config).map_err(SimError::InvalidConfig)?;

        let capacity = config.world_capacity();
        let mut sim = Self {
            config,
            cycle: 0,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_organism_id: 0,
            organisms: BTreeMap::new(),
            occupancy: vec![None; capacity],
            update_order: Vec::new(),
            new_organism_ids: Vec::new(),
            lineage_counts: BTreeMap::new(),
            best_current: ChampionInfo::default(),
            best_all_time: ChampionInfo::default(),
            food,
            environment,
            metrics: MetricsSnapshot::default(),
        };

        sim.seed_initial_food();
        sim.spawn_initial_population()?;
        sim.rebuild_update_order();
        sim.refresh_population_metrics();
        Ok(sim)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn step_n(&mut self, count: u32) -> Result<Vec<TickDelta>, SimError> {
        let mut deltas = Vec::with_capacity(count as usize);
        for _ in 0..count {
            deltas.push(self.tick()?);
        }
        Ok(deltas)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            cycle: self.cycle,
            rng_seed: self.seed,
            config: self.config.clone(),
            organisms: self.organisms.values().cloned().collect(),
            update_order: self.update_order.clone(),
            lineage_counts: self.lineage_counts.clone(),
            best_current: self.best_current.clone(),
            best_all_time: self.best_all_time.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// One JSON snapshot line for the initial state, then one per cycle.
    pub fn export_trace_jsonl(&mut self, cycles: u32) -> Result<Vec<String>, SimError> {
        let mut lines = Vec::with_capacity(cycles as usize + 1);
        lines.push(serde_json::to_string(&self.snapshot())?);
        for _ in 0..cycles {
            self.tick()?;
            lines.push(serde_json::to_string(&self.snapshot())?);
        }
        Ok(lines)
    }

    pub fn organism_count(&self) -> usize {
        self.organisms.len()
    }

    pub fn organism(&self, id: OrganismId) -> Option<&OrganismState> {
        self.organisms.get(&id)
    }

    pub fn organisms(&self) -> impl Iterator<Item = &OrganismState> {
        self.organisms.values()
    }

    pub fn update_order(&self) -> &[OrganismId] {
        &self.update_order
    }

    pub fn lineage_counts(&self) -> &BTreeMap<OrganismId, u32> {
        &self.lineage_counts
    }

    pub fn best_current(&self) -> &ChampionInfo {
        &self.best_current
    }

    pub fn best_all_time(&self) -> &ChampionInfo {
        &self.best_all_time
    }

    pub fn metrics(&self) -> &MetricsSnapshot {
        &self.metrics
    }

    pub fn food_at(&self, point: Point) -> Option<u32> {
        self.food.food_at(point)
    }

    pub fn ph_at(&self, point: Point) -> f32 {
        self.environment.ph_at(point)
    }

    pub fn occupant_at(&self, point: Point) -> Option<OrganismId> {
        self.occupancy[self.cell_index(point)]
    }

    pub fn organism_at(&self, point: Point) -> Option<&OrganismState> {
        self.occupant_at(point)
            .and_then(|id| self.organisms.get(&id))
    }

    fn cell_index(&self, point: Point) -> usize {
        grid::cell_index(point, self.width(), self.height())
    }

    fn width(&self) -> i32 {
        self.config.grid_units_wide as i32
    }

    fn height(&self) -> i32 {
        self.config.grid_units_high as i32
    }

    /// Empty means neither an organism nor food occupies the cell.
    fn is_cell_empty(&self, point: Point) -> bool {
        self.occupant_at(point).is_none() && self.food.food_at(point).is_none()
    }

    /// Next tick's order: this tick's order plus newcomers, minus the dead.
    fn rebuild_update_order(&mut self) {
        let mut order = std::mem::take(&mut self.update_order);
        order.append(&mut self.new_organism_ids);
        order.retain(|id| self.organisms.contains_key(id));
        self.update_order = order;
    }

    fn refresh_population_metrics(&mut self) {
        self.metrics.cycles = self.cycle;
        self.metrics.organisms = self.organisms.len() as u32;
        self.metrics.food_items = self.food.item_count() as u32;
        self.metrics.total_organisms_created = self.next_organism_id;
    }

    fn debug_assert_consistent_state(&self) {
        if cfg!(debug_assertions) {
            debug_assert_eq!(
                self.organisms.len(),
                self.occupancy.iter().flatten().count(),
                "occupancy count should match organism count",
            );
            for organism in self.organisms.values() {
                debug_assert_eq!(
                    self.occupancy[self.cell_index(organism.location)],
                    Some(organism.id),
                    "occupancy must point at the organism occupying that cell",
                );
            }
            debug_assert_eq!(
                self.update_order.len(),
                self.organisms.len(),
                "every live organism should be scheduled exactly once",
            );
        }
    }
}

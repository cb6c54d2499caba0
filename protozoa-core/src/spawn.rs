use crate::grid::{neighbor, rotate_left};
use crate::organism::{new_child_organism, new_random_organism};
use crate::{SimError, Simulation};
use protozoa_types::{OrganismId, OrganismState, Point};
use rand::Rng;
use tracing::debug;

impl Simulation {
    /// Places one new root organism on a uniformly sampled cell. A single cell is
    /// sampled; if it is taken the attempt is dropped for this cycle.
    pub fn spawn_random_organism(&mut self) -> Result<Option<OrganismId>, SimError> {
        if self.organisms.len() >= self.config.max_organisms as usize {
            return Ok(None);
        }
        let location = self.random_point();
        if !self.is_cell_empty(location) {
            return Ok(None);
        }

        let id = self.alloc_organism_id();
        let organism = new_random_organism(id, location, &self.config, &mut self.rng)?;
        debug!(
            organism = %id,
            x = location.x,
            y = location.y,
            tree_size = organism.decision_tree.size(),
            "spawned root organism"
        );
        self.register_new_organism(organism);
        Ok(Some(id))
    }

    /// Places a child of `parent_id` on the first empty cell found by looking ahead
    /// of the parent and then turning left, four directions in all. The parent is
    /// left untouched; the caller applies the reproduction cost.
    pub fn spawn_child_organism(&mut self, parent_id: OrganismId) -> Option<OrganismId> {
        if self.organisms.len() >= self.config.max_organisms as usize {
            return None;
        }
        let parent = self.organisms.get(&parent_id)?;
        let (width, height) = (self.width(), self.height());
        let mut direction = parent.direction;
        let origin = parent.location;

        let mut placement = None;
        for _ in 0..4 {
            let candidate = neighbor(origin, direction, width, height);
            if self.is_cell_empty(candidate) {
                placement = Some((candidate, direction));
                break;
            }
            direction = rotate_left(direction);
        }
        let (location, direction) = placement?;

        let id = self.alloc_organism_id();
        let parent = self.organisms.get(&parent_id)?;
        let child = new_child_organism(id, location, direction, parent, &self.config, &mut self.rng);
        debug!(
            parent = %parent_id,
            child = %id,
            ancestor = %child.original_ancestor_id,
            x = location.x,
            y = location.y,
            "spawned child organism"
        );
        self.register_new_organism(child);
        Some(id)
    }

    /// Adds the organism to the map and occupancy index. It joins the update order
    /// at the next rebuild, so it is never evaluated in the cycle it was born.
    fn register_new_organism(&mut self, organism: OrganismState) {
        let idx = self.cell_index(organism.location);
        debug_assert!(self.occupancy[idx].is_none());
        self.occupancy[idx] = Some(organism.id);
        if !organism.is_root() {
            *self
                .lineage_counts
                .entry(organism.original_ancestor_id)
                .or_insert(0) += 1;
        }
        self.new_organism_ids.push(organism.id);
        self.organisms.insert(organism.id, organism);
    }

    pub(crate) fn spawn_initial_population(&mut self) -> Result<(), SimError> {
        for _ in 0..self.config.initial_organisms {
            self.spawn_random_organism()?;
        }
        Ok(())
    }

    pub(crate) fn seed_initial_food(&mut self) {
        for _ in 0..self.config.initial_food {
            self.add_random_food_item();
        }
    }

    pub(crate) fn replenish_food(&mut self) {
        if self.rng.random::<f32>() < self.config.chance_to_add_food_item {
            self.add_random_food_item();
        }
    }

    fn add_random_food_item(&mut self) -> bool {
        let location = self.random_point();
        if !self.is_cell_empty(location) {
            return false;
        }
        let amount = self
            .rng
            .random_range(self.config.min_food_value..=self.config.max_food_value);
        self.food.add_food(location, amount) > 0
    }

    fn random_point(&mut self) -> Point {
        Point::new(
            self.rng.random_range(0..self.width()),
            self.rng.random_range(0..self.height()),
        )
    }

    fn alloc_organism_id(&mut self) -> OrganismId {
        let id = OrganismId(self.next_organism_id);
        self.next_organism_id += 1;
        id
    }
}

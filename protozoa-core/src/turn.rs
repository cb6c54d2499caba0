use crate::decision::DecisionError;
use crate::evaluate::{evaluate_tree, OrganismProfile, Perspective, WorldQuery};
use crate::grid::{cell_index, neighbor, rotate_left, rotate_right};
use crate::organism::{can_spawn, update_stats};
use crate::world::{Environment, FoodService};
use crate::{SimError, Simulation};
use protozoa_types::{
    Action, ChampionInfo, Direction, OrganismId, OrganismState, Point, RemovedOrganism,
    TickDelta,
};
use rand::Rng;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, trace};

const RNG_CYCLE_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
const RNG_ORGANISM_MIX: u64 = 0xBF58_476D_1CE4_E5B9;

#[derive(Debug, Default)]
struct CycleStats {
    random_spawns: u32,
    births: u32,
    deaths: u32,
    kills: u32,
    food_eaten: u64,
    action_counts: BTreeMap<Action, u32>,
    removed: Vec<RemovedOrganism>,
}

/// Frozen world state shared by every organism during the decide pass.
struct DecideView<'a> {
    width: i32,
    height: i32,
    cycle: u64,
    seed: u64,
    occupancy: &'a [Option<OrganismId>],
    profiles: &'a HashMap<OrganismId, OrganismProfile>,
    food: &'a dyn FoodService,
    environment: &'a dyn Environment,
}

impl WorldQuery for DecideView<'_> {
    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn neighbor(&self, point: Point, direction: Direction) -> Point {
        neighbor(point, direction, self.width, self.height)
    }

    fn is_cell_empty(&self, point: Point) -> bool {
        self.occupancy[cell_index(point, self.width, self.height)].is_none()
            && self.food.food_at(point).is_none()
    }

    fn food_at(&self, point: Point) -> Option<u32> {
        self.food.food_at(point)
    }

    fn organism_at(&self, point: Point) -> Option<OrganismProfile> {
        self.occupancy[cell_index(point, self.width, self.height)]
            .and_then(|id| self.profiles.get(&id).copied())
    }

    fn ph_at(&self, point: Point) -> f32 {
        self.environment.ph_at(point)
    }

    fn random_sample(&self, organism: OrganismId) -> f32 {
        let mixed = splitmix64(
            self.seed
                ^ self.cycle.wrapping_mul(RNG_CYCLE_MIX)
                ^ organism.0.wrapping_mul(RNG_ORGANISM_MIX),
        );
        (mixed >> 40) as f32 / (1_u64 << 24) as f32
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

impl Simulation {
    /// Advances the world by one cycle: optional random spawn, decide pass, resolve
    /// pass, order rebuild and food replenishment, strictly in that order.
    pub fn tick(&mut self) -> Result<TickDelta, SimError> {
        let mut stats = CycleStats::default();
        self.best_current = ChampionInfo::default();

        if self.rng.random::<f32>() < self.config.chance_to_add_organism
            && self.spawn_random_organism()?.is_some()
        {
            stats.random_spawns += 1;
        }

        let phase_started = Instant::now();
        self.decide_phase()?;
        trace!(cycle = self.cycle, elapsed = ?phase_started.elapsed(), "decide pass");

        let phase_started = Instant::now();
        self.resolve_phase(&mut stats);
        trace!(cycle = self.cycle, elapsed = ?phase_started.elapsed(), "resolve pass");

        let spawned = self.new_organism_ids.clone();
        self.rebuild_update_order();
        self.replenish_food();

        self.cycle += 1;
        self.metrics.random_spawns_last_cycle = stats.random_spawns;
        self.metrics.births_last_cycle = stats.births;
        self.metrics.deaths_last_cycle = stats.deaths;
        self.metrics.kills_last_cycle = stats.kills;
        self.metrics.food_eaten_last_cycle = stats.food_eaten;
        self.metrics.action_counts_last_cycle = stats.action_counts;
        self.refresh_population_metrics();
        self.debug_assert_consistent_state();

        Ok(TickDelta {
            cycle: self.cycle,
            spawned,
            removed: stats.removed,
            metrics: self.metrics.clone(),
        })
    }

    /// Every scheduled organism ages and grows, then picks its action against the
    /// same frozen world. Only the organism's own state, tree and chosen action
    /// are written.
    fn decide_phase(&mut self) -> Result<(), DecisionError> {
        let newcomers: HashSet<OrganismId> = self.new_organism_ids.iter().copied().collect();
        let growth_factor = self.config.growth_factor;
        self.organisms
            .par_iter_mut()
            .filter(|(id, _)| !newcomers.contains(*id))
            .for_each(|(_, organism)| update_stats(organism, growth_factor));

        // Taken after growth so neighbours are seen at their current size.
        let profiles: HashMap<OrganismId, OrganismProfile> = self
            .organisms
            .values()
            .map(|organism| (organism.id, OrganismProfile::of(organism)))
            .collect();
        let view = DecideView {
            width: self.width(),
            height: self.height(),
            cycle: self.cycle,
            seed: self.seed,
            occupancy: &self.occupancy,
            profiles: &profiles,
            food: self.food.as_ref(),
            environment: self.environment.as_ref(),
        };
        let step_limit = self.config.max_decision_tree_size as usize;

        self.organisms
            .par_iter_mut()
            .filter(|(id, _)| !newcomers.contains(*id))
            .try_for_each(|(_, organism)| {
                let perspective = Perspective::of(organism);
                organism.last_action =
                    evaluate_tree(&mut organism.decision_tree, &perspective, &view, step_limit)?;
                Ok(())
            })
    }

    fn resolve_phase(&mut self, stats: &mut CycleStats) {
        let order = self.update_order.clone();
        for id in order {
            let Some(action) = self.organisms.get(&id).map(|organism| organism.last_action) else {
                // Killed earlier in this pass.
                continue;
            };
            self.apply_upkeep(id);
            self.apply_action(id, action, stats);
            *stats.action_counts.entry(action).or_insert(0) += 1;
            self.evaluate_best(id);
            if !self.remove_if_dead(id, stats) {
                self.shift_ph(id);
            }
        }
    }

    /// Size-proportional per-cycle costs: base decay, tree upkeep and pH stress.
    fn apply_upkeep(&mut self, id: OrganismId) {
        let Some(organism) = self.organisms.get(&id) else {
            return;
        };
        let ph = self.environment.ph_at(organism.location);
        let ph_healthy = (organism.traits.ph_tolerance_min..=organism.traits.ph_tolerance_max)
            .contains(&ph);
        let tree_size = organism.decision_tree.size() as f32;

        let mut delta = self.config.health_change_per_cycle
            + self.config.health_change_per_decision_tree_node * tree_size;
        if !ph_healthy {
            delta += self.config.health_change_from_unhealthy_ph;
        }
        if let Some(organism) = self.organisms.get_mut(&id) {
            organism.health += delta * organism.size;
        }
    }

    fn apply_action(&mut self, id: OrganismId, action: Action, stats: &mut CycleStats) {
        match action {
            Action::Idle => {
                self.change_health(id, self.config.health_change_from_being_idle);
            }
            Action::TurnLeft => self.turn(id, rotate_left),
            Action::TurnRight => self.turn(id, rotate_right),
            Action::Move => self.move_ahead(id),
            Action::Eat => self.eat(id, stats),
            Action::Attack => self.attack(id, stats),
            Action::Feed => self.feed(id),
            Action::Spawn => self.reproduce(id, stats),
        }
    }

    /// Applies `fraction * size` to the organism's health and returns the delta.
    fn change_health(&mut self, id: OrganismId, fraction: f32) -> f32 {
        match self.organisms.get_mut(&id) {
            Some(organism) => {
                let delta = fraction * organism.size;
                organism.health += delta;
                delta
            }
            None => 0.0,
        }
    }

    fn cell_ahead(&self, id: OrganismId) -> Option<Point> {
        let organism = self.organisms.get(&id)?;
        Some(neighbor(
            organism.location,
            organism.direction,
            self.width(),
            self.height(),
        ))
    }

    fn turn(&mut self, id: OrganismId, rotate: fn(Direction) -> Direction) {
        self.change_health(id, self.config.health_change_from_turning);
        if let Some(organism) = self.organisms.get_mut(&id) {
            organism.direction = rotate(organism.direction);
        }
    }

    fn move_ahead(&mut self, id: OrganismId) {
        self.change_health(id, self.config.health_change_from_moving);
        let Some(target) = self.cell_ahead(id) else {
            return;
        };
        if !self.is_cell_empty(target) {
            return;
        }
        let target_idx = self.cell_index(target);
        let Some(organism) = self.organisms.get_mut(&id) else {
            return;
        };
        let from_idx = cell_index(
            organism.location,
            self.config.grid_units_wide as i32,
            self.config.grid_units_high as i32,
        );
        organism.location = target;
        self.occupancy[from_idx] = None;
        self.occupancy[target_idx] = Some(id);
    }

    fn eat(&mut self, id: OrganismId, stats: &mut CycleStats) {
        self.change_health(id, self.config.health_change_from_eating_attempt);
        let Some(target) = self.cell_ahead(id) else {
            return;
        };
        let Some(organism) = self.organisms.get_mut(&id) else {
            return;
        };
        let Some(available) = self.food.food_at(target) else {
            return;
        };
        let bite = (organism.size.max(0.0).floor() as u32).min(available);
        let eaten = self.food.remove_food(target, bite);
        organism.health += eaten as f32;
        stats.food_eaten += u64::from(eaten);
    }

    fn attack(&mut self, id: OrganismId, stats: &mut CycleStats) {
        self.change_health(id, self.config.health_change_from_attacking);
        let Some(target) = self.cell_ahead(id) else {
            return;
        };
        let Some(victim_id) = self.occupant_at(target).filter(|victim| *victim != id) else {
            return;
        };
        let Some(attacker_size) = self.organisms.get(&id).map(|organism| organism.size) else {
            return;
        };
        if let Some(victim) = self.organisms.get_mut(&victim_id) {
            victim.health += self.config.health_change_inflicted_by_attack * attacker_size;
        }
        if self.remove_if_dead(victim_id, stats) {
            stats.kills += 1;
            debug!(attacker = %id, victim = %victim_id, "organism killed by attack");
        }
    }

    /// Pays the feeding cost and hands the same amount to the organism ahead, or
    /// drops it as food when nobody is there. Food the cell ahead cannot hold is
    /// refunded to the feeder.
    fn feed(&mut self, id: OrganismId) {
        let paid = -self.change_health(id, self.config.health_change_from_feeding);
        if paid <= 0.0 {
            return;
        }
        let Some(target) = self.cell_ahead(id) else {
            return;
        };
        match self.occupant_at(target).filter(|other| *other != id) {
            Some(recipient) => {
                if let Some(organism) = self.organisms.get_mut(&recipient) {
                    organism.health += paid;
                }
            }
            None => {
                let offered = paid.floor() as u32;
                let applied = self.food.add_food(target, offered);
                if applied < offered {
                    if let Some(organism) = self.organisms.get_mut(&id) {
                        organism.health += (offered - applied) as f32;
                    }
                }
            }
        }
    }

    fn reproduce(&mut self, id: OrganismId, stats: &mut CycleStats) {
        let Some(parent) = self.organisms.get(&id) else {
            return;
        };
        if !can_spawn(parent) {
            return;
        }
        if self.spawn_child_organism(id).is_none() {
            return;
        }
        if let Some(parent) = self.organisms.get_mut(&id) {
            parent.health -= parent.traits.spawn_health;
            parent.children += 1;
            parent.cycles_since_last_spawn = 0;
        }
        stats.births += 1;
    }

    /// Champions move only on a strict improvement in children.
    fn evaluate_best(&mut self, id: OrganismId) {
        let Some(organism) = self.organisms.get(&id) else {
            return;
        };
        if organism.children <= self.best_current.children {
            return;
        }
        self.best_current = champion_info(organism);
        if self.best_current.children > self.best_all_time.children {
            self.best_all_time = self.best_current.clone();
            info!(
                organism = %id,
                children = self.best_all_time.children,
                cycle = self.cycle,
                "new all-time champion"
            );
        }
    }

    fn shift_ph(&mut self, id: OrganismId) {
        if let Some(organism) = self.organisms.get(&id) {
            self.environment
                .change_ph(organism.location, organism.traits.ph_effect);
        }
    }

    /// Removes an organism whose health has reached zero and leaves `floor(size)`
    /// food on its cell. Returns whether it was removed.
    fn remove_if_dead(&mut self, id: OrganismId, stats: &mut CycleStats) -> bool {
        let dead = self
            .organisms
            .get(&id)
            .is_some_and(|organism| organism.health <= 0.0);
        if !dead {
            return false;
        }
        let Some(organism) = self.organisms.remove(&id) else {
            return false;
        };
        let idx = self.cell_index(organism.location);
        self.occupancy[idx] = None;
        let food_deposited = self
            .food
            .add_food(organism.location, organism.size.max(0.0).floor() as u32);
        debug!(
            organism = %id,
            age = organism.age,
            children = organism.children,
            food_deposited,
            "organism died"
        );
        stats.deaths += 1;
        stats.removed.push(RemovedOrganism {
            id,
            location: organism.location,
            food_deposited,
        });
        true
    }
}

fn champion_info(organism: &OrganismState) -> ChampionInfo {
    ChampionInfo {
        id: Some(organism.id),
        size: organism.size,
        health: organism.health,
        ancestor_id: Some(organism.original_ancestor_id),
        age: organism.age,
        children: organism.children,
        decision_tree: scored_decision_tree(organism)
            .unwrap_or_else(|| organism.decision_tree.to_string()),
        traits: organism.traits.clone(),
    }
}

/// The tree annotated with per-node usage, once it has been evaluated for the
/// organism's `cycles_to_evaluate_decision_tree`.
pub(crate) fn scored_decision_tree(organism: &OrganismState) -> Option<String> {
    let root = &organism.decision_tree;
    let required = u64::from(organism.traits.cycles_to_evaluate_decision_tree);
    (root.top_level_uses >= required).then(|| root.scored().to_string())
}

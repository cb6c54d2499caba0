use crate::decision::{copy_tree, mutate_tree, random_tree, DecisionError};
use protozoa_types::{
    Action, Direction, OrganismId, OrganismState, OrganismTraits, Point, WorldConfig,
};
use rand::Rng;
use tracing::debug;

/// Relative spread of an inherited trait, as a fraction of its configured range.
const TRAIT_PERTURBATION_FRACTION: f32 = 0.05;

pub(crate) fn random_traits<R: Rng + ?Sized>(config: &WorldConfig, rng: &mut R) -> OrganismTraits {
    let max_size = uniform(config.minimum_max_size, config.maximum_max_size, rng);
    let spawn_health_cap = (max_size * config.max_spawn_health_percent).max(config.min_spawn_health);
    let spawn_health = uniform(config.min_spawn_health, spawn_health_cap, rng);
    let min_health_to_spawn = uniform(spawn_health, max_size.max(spawn_health), rng);
    let ph_tolerance_min = uniform(config.min_ph_tolerance, config.max_ph_tolerance, rng);
    let ph_tolerance_range = uniform(
        config.min_ph_tolerance_range,
        config.max_ph_tolerance_range,
        rng,
    );

    OrganismTraits {
        max_size,
        spawn_health,
        min_health_to_spawn,
        min_cycles_between_spawns: rng.random_range(0..=config.max_cycles_between_spawns),
        chance_to_mutate_decision_tree: uniform(
            config.min_chance_to_mutate_decision_tree,
            config.max_chance_to_mutate_decision_tree,
            rng,
        ),
        cycles_to_evaluate_decision_tree: rng
            .random_range(1..=config.max_cycles_to_evaluate_decision_tree),
        ph_tolerance_min,
        ph_tolerance_max: ph_tolerance_min + ph_tolerance_range,
        ph_effect: uniform(config.min_change_to_ph, config.max_change_to_ph, rng),
    }
}

/// Parent traits with a small clamped perturbation applied to each one.
pub(crate) fn inherit_traits<R: Rng + ?Sized>(
    parent: &OrganismTraits,
    config: &WorldConfig,
    rng: &mut R,
) -> OrganismTraits {
    let max_size = perturb(
        parent.max_size,
        config.minimum_max_size,
        config.maximum_max_size,
        rng,
    );
    let spawn_health_cap = (max_size * config.max_spawn_health_percent).max(config.min_spawn_health);
    let spawn_health = perturb(
        parent.spawn_health,
        config.min_spawn_health,
        spawn_health_cap,
        rng,
    );
    let min_health_to_spawn = perturb(
        parent.min_health_to_spawn,
        spawn_health,
        max_size.max(spawn_health),
        rng,
    );
    let parent_range = parent.ph_tolerance_max - parent.ph_tolerance_min;
    let ph_tolerance_min = perturb(
        parent.ph_tolerance_min,
        config.min_ph_tolerance,
        config.max_ph_tolerance,
        rng,
    );
    let ph_tolerance_range = perturb(
        parent_range,
        config.min_ph_tolerance_range,
        config.max_ph_tolerance_range,
        rng,
    );

    OrganismTraits {
        max_size,
        spawn_health,
        min_health_to_spawn,
        min_cycles_between_spawns: step_u32(
            parent.min_cycles_between_spawns,
            0,
            config.max_cycles_between_spawns,
            rng,
        ),
        chance_to_mutate_decision_tree: perturb(
            parent.chance_to_mutate_decision_tree,
            config.min_chance_to_mutate_decision_tree,
            config.max_chance_to_mutate_decision_tree,
            rng,
        ),
        cycles_to_evaluate_decision_tree: step_u32(
            parent.cycles_to_evaluate_decision_tree,
            1,
            config.max_cycles_to_evaluate_decision_tree,
            rng,
        ),
        ph_tolerance_min,
        ph_tolerance_max: ph_tolerance_min + ph_tolerance_range,
        ph_effect: perturb(
            parent.ph_effect,
            config.min_change_to_ph,
            config.max_change_to_ph,
            rng,
        ),
    }
}

/// A root organism: fresh traits, a random tree, and itself as ancestor.
pub(crate) fn new_random_organism<R: Rng + ?Sized>(
    id: OrganismId,
    location: Point,
    config: &WorldConfig,
    rng: &mut R,
) -> Result<OrganismState, DecisionError> {
    let traits = random_traits(config, rng);
    let decision_tree = random_tree(
        rng,
        config.max_decision_tree_size as usize,
        config.chance_of_action_at_generation,
    )?;
    let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
    let health = traits.spawn_health;

    Ok(OrganismState {
        id,
        location,
        direction,
        health,
        size: health.min(traits.max_size),
        age: 0,
        children: 0,
        original_ancestor_id: id,
        cycles_since_last_spawn: 0,
        traits,
        decision_tree,
        last_action: Action::Idle,
    })
}

pub(crate) fn new_child_organism<R: Rng + ?Sized>(
    id: OrganismId,
    location: Point,
    direction: Direction,
    parent: &OrganismState,
    config: &WorldConfig,
    rng: &mut R,
) -> OrganismState {
    let traits = inherit_traits(&parent.traits, config, rng);
    let decision_tree = if rng.random::<f32>() < parent.traits.chance_to_mutate_decision_tree {
        let mutated = mutate_tree(
            &parent.decision_tree,
            config.max_decision_tree_size as usize,
            rng,
        );
        debug!(
            parent = %parent.id,
            child = %id,
            size_before = parent.decision_tree.size(),
            size_after = mutated.size(),
            "mutated inherited decision tree"
        );
        mutated
    } else {
        copy_tree(&parent.decision_tree)
    };
    let health = parent.traits.spawn_health;

    OrganismState {
        id,
        location,
        direction,
        health,
        size: health.min(traits.max_size),
        age: 0,
        children: 0,
        original_ancestor_id: parent.original_ancestor_id,
        cycles_since_last_spawn: 0,
        traits,
        decision_tree,
        last_action: Action::Idle,
    }
}

pub fn can_spawn(organism: &OrganismState) -> bool {
    organism.cycles_since_last_spawn >= organism.traits.min_cycles_between_spawns
        && organism.health >= organism.traits.min_health_to_spawn
        && organism.health > organism.traits.spawn_health
}

/// Per-cycle aging and growth, run during the decide pass.
pub(crate) fn update_stats(organism: &mut OrganismState, growth_factor: f32) {
    organism.age += 1;
    organism.cycles_since_last_spawn = organism.cycles_since_last_spawn.saturating_add(1);
    organism.size = (organism.size + growth_factor).min(organism.traits.max_size);
}

fn uniform<R: Rng + ?Sized>(min: f32, max: f32, rng: &mut R) -> f32 {
    if max <= min {
        return min;
    }
    rng.random_range(min..=max)
}

/// Box-Muller sample around `value`, clamped into `[min, max]`.
fn perturb<R: Rng + ?Sized>(value: f32, min: f32, max: f32, rng: &mut R) -> f32 {
    if max <= min {
        return min;
    }
    let stddev = (max - min) * TRAIT_PERTURBATION_FRACTION;
    let u1: f32 = rng.random::<f32>().max(f32::EPSILON);
    let u2: f32 = rng.random::<f32>();
    let normal = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
    (value + normal * stddev).clamp(min, max)
}

fn step_u32<R: Rng + ?Sized>(value: u32, min: u32, max: u32, rng: &mut R) -> u32 {
    if min >= max {
        return min;
    }
    match rng.random_range(0..3) {
        0 => value.saturating_sub(1).max(min),
        1 => value.saturating_add(1).min(max),
        _ => value.clamp(min, max),
    }
}

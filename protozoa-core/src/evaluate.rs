use crate::decision::DecisionError;
use crate::grid::{rotate_left, rotate_right};
use protozoa_types::{
    Action, Condition, DecisionNode, Direction, NodeKind, OrganismId, OrganismState, Point,
};

/// What another organism looks like to an observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganismProfile {
    pub id: OrganismId,
    pub size: f32,
    pub original_ancestor_id: OrganismId,
}

impl OrganismProfile {
    pub fn of(organism: &OrganismState) -> Self {
        Self {
            id: organism.id,
            size: organism.size,
            original_ancestor_id: organism.original_ancestor_id,
        }
    }
}

/// Read-only view of the world used while choosing actions.
pub trait WorldQuery {
    fn cycle(&self) -> u64;

    /// Adjacent cell in `direction`, wrapped onto the grid.
    fn neighbor(&self, point: Point, direction: Direction) -> Point;

    /// True when the cell has neither an organism nor food.
    fn is_cell_empty(&self, point: Point) -> bool;

    fn food_at(&self, point: Point) -> Option<u32>;

    fn organism_at(&self, point: Point) -> Option<OrganismProfile>;

    fn ph_at(&self, point: Point) -> f32;

    /// Uniform sample in `[0, 1)` that is stable for a given organism and cycle.
    fn random_sample(&self, organism: OrganismId) -> f32;
}

/// The evaluating organism's own state, copied out so its tree can be borrowed
/// mutably during the walk.
#[derive(Debug, Clone, Copy)]
pub struct Perspective {
    pub id: OrganismId,
    pub location: Point,
    pub direction: Direction,
    pub health: f32,
    pub size: f32,
    pub max_size: f32,
    pub original_ancestor_id: OrganismId,
    pub can_spawn: bool,
    pub ph_tolerance_min: f32,
    pub ph_tolerance_max: f32,
}

impl Perspective {
    pub fn of(organism: &OrganismState) -> Self {
        Self {
            id: organism.id,
            location: organism.location,
            direction: organism.direction,
            health: organism.health,
            size: organism.size,
            max_size: organism.traits.max_size,
            original_ancestor_id: organism.original_ancestor_id,
            can_spawn: crate::organism::can_spawn(organism),
            ph_tolerance_min: organism.traits.ph_tolerance_min,
            ph_tolerance_max: organism.traits.ph_tolerance_max,
        }
    }
}

/// Walks the tree from the root to an action leaf, recording usage on every node
/// along the path. Afterwards exactly one leaf has `used_last_cycle` set.
pub fn evaluate_tree<W: WorldQuery + ?Sized>(
    root: &mut DecisionNode,
    perspective: &Perspective,
    world: &W,
    step_limit: usize,
) -> Result<Action, DecisionError> {
    clear_last_cycle_flags(root);
    root.top_level_uses += 1;
    root.avg_health_when_top_level = running_average(
        root.avg_health_when_top_level,
        perspective.health,
        root.top_level_uses,
    );
    let mut steps = 0;
    descend(root, perspective, world, &mut steps, step_limit)
}

fn descend<W: WorldQuery + ?Sized>(
    node: &mut DecisionNode,
    perspective: &Perspective,
    world: &W,
    steps: &mut usize,
    step_limit: usize,
) -> Result<Action, DecisionError> {
    *steps += 1;
    if *steps > step_limit {
        return Err(DecisionError::StepLimitExceeded { limit: step_limit });
    }
    node.uses += 1;
    node.avg_health = running_average(node.avg_health, perspective.health, node.uses);

    match &mut node.kind {
        NodeKind::Action { action } => {
            let chosen = *action;
            node.used_last_cycle = true;
            Ok(chosen)
        }
        NodeKind::Condition { condition, yes, no } => {
            let branch = if check_condition(*condition, perspective, world) {
                yes
            } else {
                no
            };
            descend(branch, perspective, world, steps, step_limit)
        }
    }
}

fn clear_last_cycle_flags(node: &mut DecisionNode) {
    node.used_last_cycle = false;
    if let NodeKind::Condition { yes, no, .. } = &mut node.kind {
        clear_last_cycle_flags(yes);
        clear_last_cycle_flags(no);
    }
}

fn running_average(average: f32, sample: f32, count: u64) -> f32 {
    average + (sample - average) / count.max(1) as f32
}

pub fn check_condition<W: WorldQuery + ?Sized>(
    condition: Condition,
    perspective: &Perspective,
    world: &W,
) -> bool {
    let ahead = || world.neighbor(perspective.location, perspective.direction);
    let left = || world.neighbor(perspective.location, rotate_left(perspective.direction));
    let right = || world.neighbor(perspective.location, rotate_right(perspective.direction));

    match condition {
        Condition::CanMove => world.is_cell_empty(ahead()),
        Condition::IsFoodAhead => world.food_at(ahead()).is_some(),
        Condition::IsFoodLeft => world.food_at(left()).is_some(),
        Condition::IsFoodRight => world.food_at(right()).is_some(),
        Condition::IsOrganismAhead => world.organism_at(ahead()).is_some(),
        Condition::IsOrganismLeft => world.organism_at(left()).is_some(),
        Condition::IsOrganismRight => world.organism_at(right()).is_some(),
        Condition::IsBiggerOrganismAhead => world
            .organism_at(ahead())
            .is_some_and(|other| other.size > perspective.size),
        Condition::IsRelatedOrganismAhead => world
            .organism_at(ahead())
            .is_some_and(|other| other.original_ancestor_id == perspective.original_ancestor_id),
        Condition::IsHealthyPhHere => {
            let ph = world.ph_at(perspective.location);
            (perspective.ph_tolerance_min..=perspective.ph_tolerance_max).contains(&ph)
        }
        Condition::IsHealthAboveHalf => perspective.health > perspective.max_size * 0.5,
        Condition::CanSpawn => perspective.can_spawn,
        Condition::IsRandomFiftyPercent => world.random_sample(perspective.id) < 0.5,
    }
}

use super::*;

/// Small quiet world: no random spawns, no food drops, no growth, and no upkeep
/// beyond what a test opts into.
pub(super) fn test_config(width: u32, height: u32) -> WorldConfig {
    WorldConfig {
        grid_units_wide: width,
        grid_units_high: height,
        initial_organisms: 0,
        initial_food: 0,
        chance_to_add_organism: 0.0,
        chance_to_add_food_item: 0.0,
        max_organisms: 100,
        growth_factor: 0.0,
        health_change_per_decision_tree_node: 0.0,
        health_change_from_unhealthy_ph: 0.0,
        ..WorldConfig::default()
    }
}

/// `test_config` with every health delta zeroed, so only the change under test
/// moves an organism's health.
pub(super) fn zero_cost_config(width: u32, height: u32) -> WorldConfig {
    WorldConfig {
        health_change_per_cycle: 0.0,
        health_change_from_being_idle: 0.0,
        health_change_from_turning: 0.0,
        health_change_from_moving: 0.0,
        health_change_from_eating_attempt: 0.0,
        health_change_from_attacking: 0.0,
        health_change_inflicted_by_attack: 0.0,
        health_change_from_feeding: 0.0,
        ..test_config(width, height)
    }
}

pub(super) fn stable_traits(size: f32) -> OrganismTraits {
    OrganismTraits {
        max_size: size,
        spawn_health: 1.0,
        min_health_to_spawn: 2.0,
        min_cycles_between_spawns: 0,
        chance_to_mutate_decision_tree: 0.0,
        cycles_to_evaluate_decision_tree: 1,
        ph_tolerance_min: 0.0,
        ph_tolerance_max: 14.0,
        ph_effect: 0.0,
    }
}

/// A root organism whose tree always picks `action`.
pub(super) fn make_organism(
    id: u64,
    x: i32,
    y: i32,
    direction: Direction,
    action: Action,
    health: f32,
    size: f32,
) -> OrganismState {
    with_tree(
        id,
        x,
        y,
        direction,
        DecisionNode::leaf(action),
        health,
        size,
    )
}

pub(super) fn with_tree(
    id: u64,
    x: i32,
    y: i32,
    direction: Direction,
    mut decision_tree: DecisionNode,
    health: f32,
    size: f32,
) -> OrganismState {
    assign_node_ids(&mut decision_tree);
    OrganismState {
        id: OrganismId(id),
        location: Point::new(x, y),
        direction,
        health,
        size,
        age: 0,
        children: 0,
        original_ancestor_id: OrganismId(id),
        cycles_since_last_spawn: 0,
        traits: stable_traits(size),
        decision_tree,
        last_action: Action::Idle,
    }
}

/// Replaces the population with `organisms`, scheduled in id order, and resets
/// food, pH, lineage and champions.
pub(super) fn configure_sim(sim: &mut Simulation, organisms: Vec<OrganismState>) {
    sim.organisms = organisms
        .into_iter()
        .map(|organism| (organism.id, organism))
        .collect();
    sim.occupancy = vec![None; sim.config.world_capacity()];
    for organism in sim.organisms.values() {
        let idx = sim.cell_index(organism.location);
        assert!(
            sim.occupancy[idx].is_none(),
            "test setup should not overlap"
        );
        sim.occupancy[idx] = Some(organism.id);
    }
    sim.update_order = sim.organisms.keys().copied().collect();
    sim.new_organism_ids.clear();
    sim.next_organism_id = sim
        .organisms
        .keys()
        .map(|id| id.0)
        .max()
        .map_or(0, |max_id| max_id + 1);
    sim.lineage_counts.clear();
    sim.best_current = ChampionInfo::default();
    sim.best_all_time = ChampionInfo::default();
    sim.food = Box::new(FoodGrid::new(&sim.config));
    sim.environment = Box::new(PhGrid::new(&sim.config));
    sim.cycle = 0;
    sim.metrics = MetricsSnapshot::default();
    sim.refresh_population_metrics();
}

pub(super) fn sim_with(config: WorldConfig, organisms: Vec<OrganismState>) -> Simulation {
    let mut sim = Simulation::new(config, 17).expect("simulation should initialize");
    configure_sim(&mut sim, organisms);
    sim
}

pub(super) fn tick_once(sim: &mut Simulation) -> TickDelta {
    sim.tick().expect("tick should succeed")
}

pub(super) fn place_food(sim: &mut Simulation, x: i32, y: i32, amount: u32) {
    let added = sim.food.add_food(Point::new(x, y), amount);
    assert_eq!(added, amount, "test food should fit in the cell");
}

pub(super) fn organism(sim: &Simulation, id: u64) -> &OrganismState {
    sim.organism(OrganismId(id))
        .expect("organism should be alive")
}

pub(super) fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}

pub(super) fn assert_occupancy_consistent(sim: &Simulation) {
    let mut seen = HashSet::new();
    for organism in sim.organisms.values() {
        assert!(
            seen.insert(organism.location),
            "organisms should not share a cell"
        );
        let idx = sim.cell_index(organism.location);
        assert_eq!(sim.occupancy[idx], Some(organism.id));
    }
    assert_eq!(
        sim.organisms.len(),
        sim.occupancy.iter().flatten().count()
    );
}

/// Nodes in in-order ("yes", node, "no").
pub(super) fn in_order_nodes(node: &DecisionNode) -> Vec<&DecisionNode> {
    let mut out = Vec::new();
    collect_in_order(node, &mut out);
    out
}

fn collect_in_order<'a>(node: &'a DecisionNode, out: &mut Vec<&'a DecisionNode>) {
    match &node.kind {
        NodeKind::Action { .. } => out.push(node),
        NodeKind::Condition { yes, no, .. } => {
            collect_in_order(yes, out);
            out.push(node);
            collect_in_order(no, out);
        }
    }
}

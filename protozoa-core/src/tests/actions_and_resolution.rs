use super::support::*;
use super::*;

#[test]
fn eat_converts_available_food_into_health() {
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![make_organism(0, 1, 1, Direction::East, Action::Eat, 1.0, 5.7)],
    );
    place_food(&mut sim, 2, 1, 3);

    let delta = tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 4.0);
    assert_eq!(sim.food_at(Point::new(2, 1)), None);
    assert_eq!(delta.metrics.food_eaten_last_cycle, 3);
}

#[test]
fn eat_takes_at_most_size_and_leaves_the_rest() {
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![make_organism(0, 1, 1, Direction::East, Action::Eat, 1.0, 5.0)],
    );
    place_food(&mut sim, 2, 1, 20);

    tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 6.0);
    assert_eq!(sim.food_at(Point::new(2, 1)), Some(15));
}

#[test]
fn eating_with_nothing_ahead_only_costs_health() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_eating_attempt = -0.1;
    let mut sim = sim_with(
        config,
        vec![make_organism(0, 1, 1, Direction::East, Action::Eat, 2.0, 5.0)],
    );

    tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 1.5);
}

#[test]
fn attack_kills_weaker_target_and_leaves_food() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_inflicted_by_attack = -0.5;
    let mut sim = sim_with(
        config,
        vec![
            make_organism(0, 1, 1, Direction::East, Action::Attack, 1.0, 10.0),
            make_organism(1, 2, 1, Direction::West, Action::Idle, 0.4, 1.0),
        ],
    );

    let delta = tick_once(&mut sim);

    assert!(sim.organism(OrganismId(1)).is_none());
    assert_eq!(sim.occupant_at(Point::new(2, 1)), None);
    assert_eq!(sim.food_at(Point::new(2, 1)), Some(1));
    assert_eq!(
        delta.removed,
        vec![RemovedOrganism {
            id: OrganismId(1),
            location: Point::new(2, 1),
            food_deposited: 1,
        }]
    );
    assert_eq!(delta.metrics.kills_last_cycle, 1);
    assert_eq!(delta.metrics.deaths_last_cycle, 1);
    assert_eq!(sim.update_order(), &[OrganismId(0)]);
    assert_close(organism(&sim, 0).health, 1.0);
    assert_occupancy_consistent(&sim);
}

#[test]
fn mutual_attack_is_won_by_whoever_resolves_first() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_inflicted_by_attack = -0.5;
    let duelists = || {
        vec![
            make_organism(0, 1, 1, Direction::East, Action::Attack, 1.0, 10.0),
            make_organism(1, 2, 1, Direction::West, Action::Attack, 1.0, 10.0),
        ]
    };

    let mut sim = sim_with(config.clone(), duelists());
    tick_once(&mut sim);
    assert!(sim.organism(OrganismId(0)).is_some());
    assert!(sim.organism(OrganismId(1)).is_none());

    let mut sim = sim_with(config, duelists());
    sim.update_order = vec![OrganismId(1), OrganismId(0)];
    tick_once(&mut sim);
    assert!(sim.organism(OrganismId(0)).is_none());
    assert!(sim.organism(OrganismId(1)).is_some());
}

#[test]
fn move_relocates_into_empty_cell() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_moving = -0.1;
    let mut sim = sim_with(
        config,
        vec![make_organism(0, 1, 1, Direction::East, Action::Move, 2.0, 2.0)],
    );

    tick_once(&mut sim);

    let mover = organism(&sim, 0);
    assert_eq!(mover.location, Point::new(2, 1));
    assert_close(mover.health, 1.8);
    assert_eq!(sim.occupant_at(Point::new(2, 1)), Some(OrganismId(0)));
    assert_eq!(sim.occupant_at(Point::new(1, 1)), None);
}

#[test]
fn move_wraps_around_the_grid_edge() {
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![make_organism(0, 0, 0, Direction::North, Action::Move, 2.0, 2.0)],
    );

    tick_once(&mut sim);

    assert_eq!(organism(&sim, 0).location, Point::new(0, 7));
    assert_occupancy_consistent(&sim);
}

#[test]
fn blocked_move_still_pays_its_cost() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_moving = -0.1;
    let mut sim = sim_with(
        config,
        vec![
            make_organism(0, 1, 1, Direction::East, Action::Move, 2.0, 2.0),
            make_organism(1, 1, 3, Direction::East, Action::Move, 2.0, 2.0),
            make_organism(2, 2, 1, Direction::East, Action::Idle, 2.0, 2.0),
        ],
    );
    sim.update_order = vec![OrganismId(2), OrganismId(0), OrganismId(1)];
    place_food(&mut sim, 2, 3, 10);

    tick_once(&mut sim);

    // One blocked by an organism, one by food.
    assert_eq!(organism(&sim, 0).location, Point::new(1, 1));
    assert_close(organism(&sim, 0).health, 1.8);
    assert_eq!(organism(&sim, 1).location, Point::new(1, 3));
    assert_close(organism(&sim, 1).health, 1.8);
}

#[test]
fn turning_rotates_facing() {
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![
            make_organism(0, 1, 1, Direction::North, Action::TurnLeft, 2.0, 2.0),
            make_organism(1, 4, 4, Direction::North, Action::TurnRight, 2.0, 2.0),
        ],
    );

    tick_once(&mut sim);
    assert_eq!(organism(&sim, 0).direction, Direction::West);
    assert_eq!(organism(&sim, 1).direction, Direction::East);

    tick_once(&mut sim);
    assert_eq!(organism(&sim, 0).direction, Direction::South);
    assert_eq!(organism(&sim, 1).direction, Direction::South);
}

#[test]
fn idle_restores_health_in_proportion_to_size() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_being_idle = 0.25;
    config.health_change_per_cycle = -0.125;
    let mut sim = sim_with(
        config,
        vec![make_organism(0, 1, 1, Direction::North, Action::Idle, 1.0, 4.0)],
    );

    tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 1.5);
}

#[test]
fn feed_transfers_paid_health_to_organism_ahead() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_feeding = -0.5;
    let mut sim = sim_with(
        config,
        vec![
            make_organism(0, 1, 1, Direction::East, Action::Feed, 6.0, 8.0),
            make_organism(1, 2, 1, Direction::West, Action::Idle, 1.0, 1.0),
        ],
    );

    tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 2.0);
    assert_close(organism(&sim, 1).health, 5.0);
    assert_eq!(sim.food_at(Point::new(2, 1)), None);
}

#[test]
fn feed_without_recipient_drops_food() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_feeding = -0.5;
    let mut sim = sim_with(
        config,
        vec![make_organism(0, 1, 1, Direction::East, Action::Feed, 6.0, 8.0)],
    );

    tick_once(&mut sim);

    assert_close(organism(&sim, 0).health, 2.0);
    assert_eq!(sim.food_at(Point::new(2, 1)), Some(4));
}

#[test]
fn feeding_into_a_full_food_cell_refunds_what_did_not_fit() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_feeding = -0.5;
    config.max_food_value = 10;
    let mut sim = sim_with(
        config,
        vec![make_organism(0, 1, 1, Direction::East, Action::Feed, 6.0, 8.0)],
    );
    place_food(&mut sim, 2, 1, 9);

    tick_once(&mut sim);

    // Four units offered, one fits.
    assert_eq!(sim.food_at(Point::new(2, 1)), Some(10));
    assert_close(organism(&sim, 0).health, 5.0);
}

#[test]
fn organism_at_zero_health_becomes_food() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_per_cycle = -0.1;
    let mut sim = sim_with(
        config,
        vec![
            make_organism(0, 3, 3, Direction::North, Action::Idle, 0.1, 3.5),
            make_organism(1, 6, 6, Direction::North, Action::Idle, 5.0, 1.0),
        ],
    );

    let delta = tick_once(&mut sim);

    assert!(sim.organism(OrganismId(0)).is_none());
    assert_eq!(sim.occupant_at(Point::new(3, 3)), None);
    assert_eq!(sim.food_at(Point::new(3, 3)), Some(3));
    assert_eq!(delta.removed.len(), 1);
    assert_eq!(delta.removed[0].food_deposited, 3);
    assert_eq!(sim.update_order(), &[OrganismId(1)]);
    assert_eq!(sim.organism_count(), 1);
}

#[test]
fn unhealthy_ph_and_tree_size_add_upkeep() {
    let mut config = zero_cost_config(8, 8);
    config.health_change_from_unhealthy_ph = -0.5;
    config.health_change_per_decision_tree_node = -0.125;
    let tree = DecisionNode::branch(
        Condition::IsRandomFiftyPercent,
        DecisionNode::leaf(Action::Idle),
        DecisionNode::leaf(Action::Idle),
    );
    let mut intolerant = with_tree(0, 1, 1, Direction::North, tree, 10.0, 2.0);
    intolerant.traits.ph_tolerance_min = 8.0;
    intolerant.traits.ph_tolerance_max = 9.0;
    let mut sim = sim_with(config, vec![intolerant]);

    tick_once(&mut sim);

    // Three nodes at 0.125 each plus the pH penalty, both scaled by size 2.
    assert_close(organism(&sim, 0).health, 10.0 - 0.75 - 1.0);
}

#[test]
fn surviving_organisms_shift_ph_at_their_cell() {
    let mut organism_state = make_organism(0, 2, 2, Direction::North, Action::Idle, 5.0, 1.0);
    organism_state.traits.ph_effect = 0.25;
    let mut sim = sim_with(zero_cost_config(8, 8), vec![organism_state]);
    let initial = sim.ph_at(Point::new(2, 2));

    tick_once(&mut sim);
    tick_once(&mut sim);

    assert_close(sim.ph_at(Point::new(2, 2)), initial + 0.5);
    assert_close(sim.ph_at(Point::new(3, 3)), initial);
}

#[test]
fn decisions_are_made_against_the_pre_resolve_world() {
    let cautious = DecisionNode::branch(
        Condition::CanMove,
        DecisionNode::leaf(Action::Move),
        DecisionNode::leaf(Action::TurnLeft),
    );
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![
            make_organism(0, 1, 1, Direction::East, Action::Move, 2.0, 2.0),
            with_tree(1, 3, 1, Direction::West, cautious, 2.0, 2.0),
        ],
    );

    tick_once(&mut sim);

    // Organism 1 saw (2, 1) empty before organism 0 moved into it.
    assert_eq!(organism(&sim, 0).location, Point::new(2, 1));
    let second = organism(&sim, 1);
    assert_eq!(second.last_action, Action::Move);
    assert_eq!(second.location, Point::new(3, 1));
    assert_eq!(second.direction, Direction::West);
}

#[test]
fn neighbours_are_compared_after_this_cycles_growth() {
    let mut config = zero_cost_config(8, 8);
    config.growth_factor = 0.5;
    let wary = DecisionNode::branch(
        Condition::IsBiggerOrganismAhead,
        DecisionNode::leaf(Action::TurnLeft),
        DecisionNode::leaf(Action::Idle),
    );
    let observer = with_tree(0, 1, 1, Direction::East, wary, 5.0, 2.0);
    let mut neighbour = make_organism(1, 2, 1, Direction::West, Action::Idle, 5.0, 2.0);
    neighbour.traits.max_size = 3.0;
    let mut sim = sim_with(config, vec![observer, neighbour]);

    tick_once(&mut sim);

    // The observer is capped at 2.0 while the neighbour has grown to 2.5.
    assert_close(organism(&sim, 1).size, 2.5);
    assert_eq!(organism(&sim, 0).last_action, Action::TurnLeft);
}

#[test]
fn action_counts_cover_every_resolved_organism() {
    let mut sim = sim_with(
        zero_cost_config(8, 8),
        vec![
            make_organism(0, 1, 1, Direction::North, Action::Idle, 2.0, 2.0),
            make_organism(1, 3, 3, Direction::North, Action::Idle, 2.0, 2.0),
            make_organism(2, 5, 5, Direction::North, Action::TurnLeft, 2.0, 2.0),
        ],
    );

    let delta = tick_once(&mut sim);

    assert_eq!(delta.metrics.action_counts_last_cycle.get(&Action::Idle), Some(&2));
    assert_eq!(
        delta.metrics.action_counts_last_cycle.get(&Action::TurnLeft),
        Some(&1)
    );
    assert_eq!(delta.metrics.cycles, 1);
    assert_eq!(delta.cycle, 1);
}

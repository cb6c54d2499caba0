use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use protozoa_config::WorldConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Eat,
    Idle,
    Move,
    TurnLeft,
    TurnRight,
    Attack,
    Feed,
    Spawn,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Eat,
        Action::Idle,
        Action::Move,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Attack,
        Action::Feed,
        Action::Spawn,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::Eat => "Eat",
            Action::Idle => "Idle",
            Action::Move => "Move",
            Action::TurnLeft => "Turn Left",
            Action::TurnRight => "Turn Right",
            Action::Attack => "Attack",
            Action::Feed => "Feed",
            Action::Spawn => "Spawn",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Condition {
    CanMove,
    IsFoodAhead,
    IsFoodLeft,
    IsFoodRight,
    IsOrganismAhead,
    IsOrganismLeft,
    IsOrganismRight,
    IsBiggerOrganismAhead,
    IsRelatedOrganismAhead,
    IsHealthyPhHere,
    IsHealthAboveHalf,
    CanSpawn,
    IsRandomFiftyPercent,
}

impl Condition {
    pub const ALL: [Condition; 13] = [
        Condition::CanMove,
        Condition::IsFoodAhead,
        Condition::IsFoodLeft,
        Condition::IsFoodRight,
        Condition::IsOrganismAhead,
        Condition::IsOrganismLeft,
        Condition::IsOrganismRight,
        Condition::IsBiggerOrganismAhead,
        Condition::IsRelatedOrganismAhead,
        Condition::IsHealthyPhHere,
        Condition::IsHealthAboveHalf,
        Condition::CanSpawn,
        Condition::IsRandomFiftyPercent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Condition::CanMove => "If Can Move Ahead",
            Condition::IsFoodAhead => "If Food Ahead",
            Condition::IsFoodLeft => "If Food Left",
            Condition::IsFoodRight => "If Food Right",
            Condition::IsOrganismAhead => "If Organism Ahead",
            Condition::IsOrganismLeft => "If Organism Left",
            Condition::IsOrganismRight => "If Organism Right",
            Condition::IsBiggerOrganismAhead => "If Bigger Organism Ahead",
            Condition::IsRelatedOrganismAhead => "If Related Organism Ahead",
            Condition::IsHealthyPhHere => "If pH Healthy Here",
            Condition::IsHealthAboveHalf => "If Health Above 50%",
            Condition::CanSpawn => "If Can Spawn",
            Condition::IsRandomFiftyPercent => "If Random 50%",
        }
    }
}

/// One element of the flat pre-order encoding of a decision tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Token {
    Action(Action),
    Condition(Condition),
}

impl Token {
    pub fn is_action(self) -> bool {
        matches!(self, Token::Action(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "node_type")]
pub enum NodeKind {
    Action {
        action: Action,
    },
    Condition {
        condition: Condition,
        yes: Box<DecisionNode>,
        no: Box<DecisionNode>,
    },
}

/// A decision tree node. A `Condition` always owns exactly two children and an
/// `Action` is always a leaf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionNode {
    pub id: u32,
    pub kind: NodeKind,
    pub uses: u64,
    pub top_level_uses: u64,
    pub avg_health: f32,
    pub avg_health_when_top_level: f32,
    pub used_last_cycle: bool,
}

impl DecisionNode {
    pub fn leaf(action: Action) -> Self {
        Self::with_kind(NodeKind::Action { action })
    }

    pub fn branch(condition: Condition, yes: DecisionNode, no: DecisionNode) -> Self {
        Self::with_kind(NodeKind::Condition {
            condition,
            yes: Box::new(yes),
            no: Box::new(no),
        })
    }

    fn with_kind(kind: NodeKind) -> Self {
        Self {
            id: 0,
            kind,
            uses: 0,
            top_level_uses: 0,
            avg_health: 0.0,
            avg_health_when_top_level: 0.0,
            used_last_cycle: false,
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, NodeKind::Action { .. })
    }

    pub fn token(&self) -> Token {
        match &self.kind {
            NodeKind::Action { action } => Token::Action(*action),
            NodeKind::Condition { condition, .. } => Token::Condition(*condition),
        }
    }

    /// Number of nodes in the tree rooted here.
    pub fn size(&self) -> usize {
        match &self.kind {
            NodeKind::Action { .. } => 1,
            NodeKind::Condition { yes, no, .. } => 1 + yes.size() + no.size(),
        }
    }

    pub fn depth(&self) -> usize {
        match &self.kind {
            NodeKind::Action { .. } => 1,
            NodeKind::Condition { yes, no, .. } => 1 + yes.depth().max(no.depth()),
        }
    }

    /// Pre-order encoding: a condition is followed by its full "yes" branch and
    /// then its full "no" branch.
    pub fn to_sequence(&self) -> Vec<Token> {
        let mut sequence = Vec::with_capacity(self.size());
        self.append_sequence(&mut sequence);
        sequence
    }

    fn append_sequence(&self, out: &mut Vec<Token>) {
        out.push(self.token());
        if let NodeKind::Condition { yes, no, .. } = &self.kind {
            yes.append_sequence(out);
            no.append_sequence(out);
        }
    }

    /// The leaf flagged as selected by the most recent decide pass, if any.
    pub fn last_used_leaf(&self) -> Option<&DecisionNode> {
        match &self.kind {
            NodeKind::Action { .. } => self.used_last_cycle.then_some(self),
            NodeKind::Condition { yes, no, .. } => {
                yes.last_used_leaf().or_else(|| no.last_used_leaf())
            }
        }
    }

    /// Display adapter that annotates every node with its usage statistics.
    pub fn scored(&self) -> ScoredTree<'_> {
        ScoredTree(self)
    }

    fn write_indented(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
        with_stats: bool,
    ) -> fmt::Result {
        let label = match &self.kind {
            NodeKind::Action { action } => action.label(),
            NodeKind::Condition { condition, .. } => condition.label(),
        };
        write!(f, "{label}")?;
        if with_stats {
            if self.uses == 0 {
                write!(f, " [unused]")?;
            } else {
                write!(f, " [uses {}, avg health {:.2}]", self.uses, self.avg_health)?;
            }
        }
        writeln!(f)?;
        if let NodeKind::Condition { yes, no, .. } = &self.kind {
            write!(f, "{}├─Then: ", "  ".repeat(depth))?;
            yes.write_indented(f, depth + 1, with_stats)?;
            write!(f, "{}└─Else: ", "  ".repeat(depth))?;
            no.write_indented(f, depth + 1, with_stats)?;
        }
        Ok(())
    }
}

/// See [`DecisionNode::scored`].
#[derive(Debug, Clone, Copy)]
pub struct ScoredTree<'a>(&'a DecisionNode);

impl fmt::Display for ScoredTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.0;
        writeln!(
            f,
            "Evaluated {} times, avg health {:.2}",
            root.top_level_uses, root.avg_health_when_top_level
        )?;
        root.write_indented(f, 0, true)
    }
}

impl fmt::Display for DecisionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0, false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OrganismTraits {
    pub max_size: f32,
    pub spawn_health: f32,
    pub min_health_to_spawn: f32,
    pub min_cycles_between_spawns: u32,
    pub chance_to_mutate_decision_tree: f32,
    /// Cycles of use after which a tree's per-node statistics are reported.
    pub cycles_to_evaluate_decision_tree: u32,
    pub ph_tolerance_min: f32,
    pub ph_tolerance_max: f32,
    pub ph_effect: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganismState {
    pub id: OrganismId,
    pub location: Point,
    pub direction: Direction,
    pub health: f32,
    pub size: f32,
    pub age: u64,
    pub children: u32,
    pub original_ancestor_id: OrganismId,
    pub cycles_since_last_spawn: u32,
    pub traits: OrganismTraits,
    pub decision_tree: DecisionNode,
    pub last_action: Action,
}

impl OrganismState {
    pub fn is_root(&self) -> bool {
        self.original_ancestor_id == self.id
    }
}

/// Stats captured for the most reproductive organism. The default value is the
/// empty sentinel that any organism with at least one child beats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChampionInfo {
    pub id: Option<OrganismId>,
    pub size: f32,
    pub health: f32,
    pub ancestor_id: Option<OrganismId>,
    pub age: u64,
    pub children: u32,
    pub decision_tree: String,
    pub traits: OrganismTraits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub organisms: u32,
    pub food_items: u32,
    pub total_organisms_created: u64,
    pub random_spawns_last_cycle: u32,
    pub births_last_cycle: u32,
    pub deaths_last_cycle: u32,
    pub kills_last_cycle: u32,
    pub food_eaten_last_cycle: u64,
    pub action_counts_last_cycle: BTreeMap<Action, u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RemovedOrganism {
    pub id: OrganismId,
    pub location: Point,
    pub food_deposited: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TickDelta {
    pub cycle: u64,
    pub spawned: Vec<OrganismId>,
    pub removed: Vec<RemovedOrganism>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    pub cycle: u64,
    pub rng_seed: u64,
    pub config: WorldConfig,
    pub organisms: Vec<OrganismState>,
    pub update_order: Vec<OrganismId>,
    pub lineage_counts: BTreeMap<OrganismId, u32>,
    pub best_current: ChampionInfo,
    pub best_all_time: ChampionInfo,
    pub metrics: MetricsSnapshot,
}

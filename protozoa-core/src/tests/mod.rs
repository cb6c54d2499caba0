pub(super) use super::*;
pub(super) use crate::decision::{
    assign_node_ids, copy_tree, mutate_tree, nth_node_mut, random_sequence, random_tree,
    tree_from_sequence,
};
pub(super) use crate::evaluate::{evaluate_tree, OrganismProfile, Perspective, WorldQuery};
pub(super) use protozoa_types::{
    Action, Condition, DecisionNode, Direction, NodeKind, OrganismTraits, RemovedOrganism, Token,
};
pub(super) use rand::SeedableRng;
pub(super) use std::collections::{HashMap, HashSet};

mod actions_and_resolution;
mod support;

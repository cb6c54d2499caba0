use protozoa_types::{Action, Condition, DecisionNode, NodeKind, Token};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("decision sequence is empty")]
    EmptySequence,
    #[error("malformed decision sequence of length {len}: condition branches never balance")]
    MalformedSequence { len: usize },
    #[error("decision sequence has {extra} trailing token(s) after a complete subtree")]
    TrailingTokens { extra: usize },
    #[error("decision tree evaluation exceeded {limit} steps")]
    StepLimitExceeded { limit: usize },
}

/// Rebuilds a tree from its pre-order encoding and numbers its nodes.
///
/// A condition token is followed by its "yes" subsequence and then its "no"
/// subsequence. The "yes" branch ends at the first point where actions outnumber
/// conditions by one.
pub fn tree_from_sequence(sequence: &[Token]) -> Result<DecisionNode, DecisionError> {
    let mut tree = build_node(sequence)?;
    assign_node_ids(&mut tree);
    Ok(tree)
}

fn build_node(sequence: &[Token]) -> Result<DecisionNode, DecisionError> {
    let (&first, rest) = sequence
        .split_first()
        .ok_or(DecisionError::EmptySequence)?;
    match first {
        Token::Action(action) => {
            if !rest.is_empty() {
                return Err(DecisionError::TrailingTokens { extra: rest.len() });
            }
            Ok(DecisionNode::leaf(action))
        }
        Token::Condition(condition) => {
            let malformed = DecisionError::MalformedSequence {
                len: sequence.len(),
            };
            let split = balanced_prefix_len(rest).ok_or(malformed.clone())?;
            let (yes, no) = rest.split_at(split);
            if no.is_empty() {
                return Err(malformed);
            }
            Ok(DecisionNode::branch(
                condition,
                build_node(yes)?,
                build_node(no)?,
            ))
        }
    }
}

fn balanced_prefix_len(tokens: &[Token]) -> Option<usize> {
    let mut balance = 0_i32;
    for (idx, token) in tokens.iter().enumerate() {
        balance += if token.is_action() { 1 } else { -1 };
        if balance == 1 {
            return Some(idx + 1);
        }
    }
    None
}

/// Random pre-order sequence holding at most `max_size` nodes.
pub fn random_sequence<R: Rng + ?Sized>(
    rng: &mut R,
    max_size: usize,
    chance_of_action: f32,
) -> Vec<Token> {
    let mut sequence = Vec::new();
    push_random_subsequence(rng, max_size.max(1), chance_of_action, &mut sequence);
    sequence
}

fn push_random_subsequence<R: Rng + ?Sized>(
    rng: &mut R,
    budget: usize,
    chance_of_action: f32,
    out: &mut Vec<Token>,
) -> usize {
    if budget < 3 || rng.random::<f32>() < chance_of_action {
        out.push(Token::Action(random_action(rng)));
        return 1;
    }

    out.push(Token::Condition(random_condition(rng)));
    let remaining = budget - 1;
    let yes_used = push_random_subsequence(rng, remaining / 2, chance_of_action, out);
    let no_used = push_random_subsequence(rng, remaining - yes_used, chance_of_action, out);
    1 + yes_used + no_used
}

pub fn random_tree<R: Rng + ?Sized>(
    rng: &mut R,
    max_size: usize,
    chance_of_action: f32,
) -> Result<DecisionNode, DecisionError> {
    tree_from_sequence(&random_sequence(rng, max_size, chance_of_action))
}

pub(crate) fn random_action<R: Rng + ?Sized>(rng: &mut R) -> Action {
    Action::ALL[rng.random_range(0..Action::ALL.len())]
}

pub(crate) fn random_condition<R: Rng + ?Sized>(rng: &mut R) -> Condition {
    Condition::ALL[rng.random_range(0..Condition::ALL.len())]
}

/// Uniform pick among the actions other than `current`.
pub(crate) fn different_action<R: Rng + ?Sized>(current: Action, rng: &mut R) -> Action {
    let last = Action::ALL[Action::ALL.len() - 1];
    let pick = Action::ALL[rng.random_range(0..Action::ALL.len() - 1)];
    if pick == current {
        last
    } else {
        pick
    }
}

pub(crate) fn different_condition<R: Rng + ?Sized>(current: Condition, rng: &mut R) -> Condition {
    let last = Condition::ALL[Condition::ALL.len() - 1];
    let pick = Condition::ALL[rng.random_range(0..Condition::ALL.len() - 1)];
    if pick == current {
        last
    } else {
        pick
    }
}

/// Deep copy with all usage statistics cleared. Node ids are preserved.
pub fn copy_tree(source: &DecisionNode) -> DecisionNode {
    let mut copy = source.clone();
    reset_stats_recursive(&mut copy);
    copy
}

fn reset_stats_recursive(node: &mut DecisionNode) {
    reset_node_stats(node);
    if let NodeKind::Condition { yes, no, .. } = &mut node.kind {
        reset_stats_recursive(yes);
        reset_stats_recursive(no);
    }
}

fn reset_node_stats(node: &mut DecisionNode) {
    node.uses = 0;
    node.top_level_uses = 0;
    node.avg_health = 0.0;
    node.avg_health_when_top_level = 0.0;
    node.used_last_cycle = false;
}

/// Copies `original` and applies one structural or value mutation to a node chosen
/// uniformly from the whole tree. The result never exceeds `max_size` nodes
/// unless `original` already did.
pub fn mutate_tree<R: Rng + ?Sized>(
    original: &DecisionNode,
    max_size: usize,
    rng: &mut R,
) -> DecisionNode {
    let mut mutated = copy_tree(original);
    let size = mutated.size();
    let target = rng.random_range(0..size);
    let found = nth_node_mut(&mut mutated, target);
    debug_assert!(
        found.is_ok(),
        "pre-order index {target} outside a tree of {size} nodes"
    );
    if let Ok(node) = found {
        mutate_node(node, size, max_size, rng);
    }
    reset_node_stats(&mut mutated);
    assign_node_ids(&mut mutated);
    mutated
}

/// Pre-order lookup. On a miss returns how many nodes were still left to skip.
pub(crate) fn nth_node_mut(node: &mut DecisionNode, n: usize) -> Result<&mut DecisionNode, usize> {
    if n == 0 {
        return Ok(node);
    }
    let remaining = n - 1;
    match &mut node.kind {
        NodeKind::Action { .. } => Err(remaining),
        NodeKind::Condition { yes, no, .. } => match nth_node_mut(yes, remaining) {
            Ok(found) => Ok(found),
            Err(left) => nth_node_mut(no, left),
        },
    }
}

fn mutate_node<R: Rng + ?Sized>(
    node: &mut DecisionNode,
    tree_size: usize,
    max_size: usize,
    rng: &mut R,
) {
    match &mut node.kind {
        NodeKind::Action { action } => {
            let original = *action;
            if rng.random::<bool>() && tree_size + 2 <= max_size {
                let fresh = DecisionNode::leaf(random_action(rng));
                let kept = DecisionNode::leaf(original);
                let (yes, no) = if rng.random::<bool>() {
                    (fresh, kept)
                } else {
                    (kept, fresh)
                };
                node.kind = NodeKind::Condition {
                    condition: random_condition(rng),
                    yes: Box::new(yes),
                    no: Box::new(no),
                };
            } else {
                *action = different_action(original, rng);
            }
        }
        NodeKind::Condition { condition, .. } => {
            if rng.random::<bool>() {
                node.kind = NodeKind::Action {
                    action: random_action(rng),
                };
            } else {
                *condition = different_condition(*condition, rng);
            }
        }
    }
    reset_node_stats(node);
}

/// Numbers nodes 0.. in in-order ("yes" subtree, node, "no" subtree).
pub fn assign_node_ids(root: &mut DecisionNode) {
    let mut next = 0;
    assign_in_order(root, &mut next);
}

fn assign_in_order(node: &mut DecisionNode, next: &mut u32) {
    match &mut node.kind {
        NodeKind::Action { .. } => {
            node.id = *next;
            *next += 1;
        }
        NodeKind::Condition { yes, no, .. } => {
            assign_in_order(yes, next);
            node.id = *next;
            *next += 1;
            assign_in_order(no, next);
        }
    }
}

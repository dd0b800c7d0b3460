//! Root-to-node chains through the turn tree.

use crate::tree::{NodeIndex, TurnTree};
use std::collections::HashSet;
use tracing::debug;

/// Ids of every node from `target_id` up to its root, `target_id` included.
///
/// Empty when `target_id` is not in the tree.
pub fn ancestry_path<'a>(tree: &'a TurnTree, target_id: &str) -> HashSet<&'a str> {
    ancestry_chain(tree, target_id)
        .into_iter()
        .map(|idx| tree.node(idx).node_id())
        .collect()
}

/// Ancestry of `target_id` ordered root first, target last.
pub fn ancestry_chain(tree: &TurnTree, target_id: &str) -> Vec<NodeIndex> {
    let Some(target) = tree.index_of(target_id) else {
        debug!(node_id = target_id, "ancestry requested for unknown turn");
        return Vec::new();
    };

    let mut chain = vec![target];
    let mut seen: HashSet<NodeIndex> = HashSet::from([target]);
    let mut cursor = target;
    while let Some(parent) = tree.node(cursor).parent {
        if !seen.insert(parent) {
            break;
        }
        chain.push(parent);
        cursor = parent;
    }
    chain.reverse();
    chain
}

/// The main line: first root, then always the earliest child, down to a leaf.
pub fn default_path(tree: &TurnTree) -> Vec<NodeIndex> {
    let Some(&root) = tree.roots().first() else {
        return Vec::new();
    };

    let mut path = vec![root];
    let mut cursor = root;
    while let Some(&first) = tree.node(cursor).children.first() {
        path.push(first);
        cursor = first;
    }
    path
}

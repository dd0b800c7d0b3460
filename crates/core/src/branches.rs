//! Display labels for branches, derived from structure.
//!
//! The first root's earliest-child line is `main`. Every later root and every
//! non-first child of a divergence opens a new branch, numbered `b1`, `b2`, …
//! in pre-order. A branch continues through earliest children down to a leaf.

use crate::tree::{NodeIndex, TurnTree};
use serde::Serialize;
use std::collections::HashMap;

pub const MAIN_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub label: String,
    pub head: NodeIndex,
    pub leaf: NodeIndex,
    pub len: usize,
    /// Divergence the branch leaves from; `None` for roots.
    pub forked_from: Option<NodeIndex>,
}

/// Every branch in pre-order of its head.
pub fn branches(tree: &TurnTree) -> Vec<Branch> {
    let mut out = Vec::new();
    for (head, label) in branch_heads(tree) {
        let mut leaf = head;
        let mut len = 1;
        while let Some(&first) = tree.node(leaf).children.first() {
            leaf = first;
            len += 1;
        }
        out.push(Branch {
            label,
            head,
            leaf,
            len,
            forked_from: tree.node(head).parent,
        });
    }
    out
}

/// Label for every node id.
pub fn branch_labels(tree: &TurnTree) -> HashMap<String, String> {
    let mut labels = HashMap::with_capacity(tree.len());
    for branch in branches(tree) {
        let mut cursor = Some(branch.head);
        while let Some(idx) = cursor {
            labels.insert(tree.node(idx).node_id().to_string(), branch.label.clone());
            cursor = tree.node(idx).children.first().copied();
        }
    }
    labels
}

fn branch_heads(tree: &TurnTree) -> Vec<(NodeIndex, String)> {
    let mut heads = Vec::new();
    let mut next_number = 1usize;
    let mut stack: Vec<(NodeIndex, bool)> = tree
        .roots()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, &r)| (r, i != 0))
        .collect();

    while let Some((idx, opens_branch)) = stack.pop() {
        if idx == tree.roots()[0] && !opens_branch {
            heads.push((idx, MAIN_BRANCH.to_string()));
        } else if opens_branch {
            heads.push((idx, format!("b{next_number}")));
            next_number += 1;
        }
        let children = &tree.node(idx).children;
        for (pos, &child) in children.iter().enumerate().rev() {
            stack.push((child, pos != 0));
        }
    }
    heads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{agent, greeting_chain, human};
    use crate::tree::build_tree;

    #[test]
    fn linear_conversation_is_all_main() {
        let tree = build_tree(&greeting_chain());
        let found = branches(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "main");
        assert_eq!(found[0].len, 4);
        assert_eq!(tree.node(found[0].leaf).node_id(), "n4");

        let labels = branch_labels(&tree);
        assert!(labels.values().all(|l| l == "main"));
    }

    #[test]
    fn forks_and_extra_roots_get_numbered_labels() {
        let mut records = greeting_chain();
        records.push(human("n5", Some("n2"), 10, "different answer"));
        records.push(agent("n6", Some("n5"), 11, "ok then"));
        records.push(human("r2", None, 20, "actually no"));
        let tree = build_tree(&records);

        let labels = branch_labels(&tree);
        assert_eq!(labels["n3"], "main");
        assert_eq!(labels["n5"], "b1");
        assert_eq!(labels["n6"], "b1");
        assert_eq!(labels["r2"], "b2");

        let b1 = branches(&tree)
            .into_iter()
            .find(|b| b.label == "b1")
            .expect("b1");
        assert_eq!(b1.forked_from, tree.index_of("n2"));
        assert_eq!(b1.len, 2);
    }

    #[test]
    fn empty_tree_has_no_branches() {
        assert!(branches(&build_tree(&[])).is_empty());
    }
}

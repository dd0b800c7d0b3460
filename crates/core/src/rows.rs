//! Flattens the tree into display rows under a collapse state.
//!
//! A renderer walks the rows top to bottom; it needs no knowledge of the
//! collapse policy. Each divergence child opens one more indentation level.

use crate::collapse::{CollapseKey, CollapseSettings, CollapseState};
use crate::tree::{NodeIndex, TurnTree, compute_linear_run, count_subtree_turns};

/// How a turn row relates to the branching around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMarker {
    None,
    /// The turn has more than one child.
    Divergence,
    /// The turn is one of several alternatives under a divergence.
    BranchStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRow {
    /// A single visible turn.
    Turn {
        node: NodeIndex,
        level: usize,
        marker: RowMarker,
    },
    /// Stand-in for the hidden middle of a folded run.
    Fold {
        key: CollapseKey,
        level: usize,
        hidden: usize,
        first_hidden: NodeIndex,
        last_hidden: NodeIndex,
        /// Turns at or below `first_hidden`, visible tail included.
        subtree_turns: usize,
    },
    /// Stand-in for every branch below a collapsed divergence.
    CollapsedBranches {
        key: CollapseKey,
        node: NodeIndex,
        level: usize,
        branches: usize,
        hidden_turns: usize,
    },
}

impl DisplayRow {
    pub fn level(&self) -> usize {
        match self {
            DisplayRow::Turn { level, .. }
            | DisplayRow::Fold { level, .. }
            | DisplayRow::CollapsedBranches { level, .. } => *level,
        }
    }

    /// The turn this row shows, if it shows exactly one.
    pub fn turn(&self) -> Option<NodeIndex> {
        match self {
            DisplayRow::Turn { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Human-readable indicator text for collapsed rows.
    pub fn indicator(&self) -> Option<String> {
        match self {
            DisplayRow::Turn { .. } => None,
            DisplayRow::Fold { hidden, .. } => Some(format!(
                "{hidden} hidden {}",
                if *hidden == 1 { "turn" } else { "turns" }
            )),
            DisplayRow::CollapsedBranches {
                branches,
                hidden_turns,
                ..
            } => Some(format!("{branches} branches, {hidden_turns} turns collapsed")),
        }
    }
}

/// Rows for the whole forest.
pub fn visible_rows(
    tree: &TurnTree,
    state: &CollapseState,
    settings: &CollapseSettings,
) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    let mut stack: Vec<(NodeIndex, usize)> = tree.roots().iter().rev().map(|&r| (r, 0)).collect();

    while let Some((head, level)) = stack.pop() {
        let run = compute_linear_run(tree, head);
        let head_id = tree.node(head).node_id();

        match settings
            .fold_split(run.len())
            .filter(|_| state.is_run_folded(head_id))
        {
            Some((keep_head, hidden, keep_tail)) => {
                for &idx in &run[..keep_head] {
                    rows.push(turn_row(tree, idx, level));
                }
                rows.push(DisplayRow::Fold {
                    key: CollapseKey::Linear(head_id.to_string()),
                    level,
                    hidden,
                    first_hidden: run[keep_head],
                    last_hidden: run[keep_head + hidden - 1],
                    subtree_turns: count_subtree_turns(tree, run[keep_head]),
                });
                for &idx in &run[run.len() - keep_tail..] {
                    rows.push(turn_row(tree, idx, level));
                }
            }
            None => {
                for &idx in &run {
                    rows.push(turn_row(tree, idx, level));
                }
            }
        }

        let Some(&last) = run.last() else {
            continue;
        };
        let last_node = tree.node(last);
        if !last_node.is_divergence() {
            continue;
        }
        if state.is_divergence_collapsed(last_node.node_id()) {
            rows.push(DisplayRow::CollapsedBranches {
                key: CollapseKey::Diverge(last_node.node_id().to_string()),
                node: last,
                level: level + 1,
                branches: last_node.children.len(),
                hidden_turns: last_node
                    .children
                    .iter()
                    .map(|&c| count_subtree_turns(tree, c))
                    .sum(),
            });
        } else {
            stack.extend(last_node.children.iter().rev().map(|&c| (c, level + 1)));
        }
    }

    rows
}

fn turn_row(tree: &TurnTree, idx: NodeIndex, level: usize) -> DisplayRow {
    let node = tree.node(idx);
    let marker = if node.is_divergence() {
        RowMarker::Divergence
    } else if tree.parent(idx).is_some_and(|p| p.is_divergence()) {
        RowMarker::BranchStart
    } else {
        RowMarker::None
    };
    DisplayRow::Turn {
        node: idx,
        level,
        marker,
    }
}

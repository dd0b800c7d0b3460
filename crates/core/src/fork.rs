//! Where a newly submitted human message attaches.
//!
//! Branches exist only because a human said something different. Without an
//! anchor a message continues the active line; with an anchor on a human
//! turn it becomes that turn's sibling. Agent turns are never placed here:
//! the engine appends them as the child of the human turn it processed.

use crate::ancestry::default_path;
use crate::tree::{NodeIndex, TurnTree};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ForkError {
    #[error("turn {node_id} not found")]
    UnknownTurn { node_id: String },
    #[error("turn {node_id} is an agent turn; only human turns can anchor an alternate reply")]
    AgentAnchor { node_id: String },
    #[error("anchor {node_id} no longer resolves; it has been cleared")]
    StaleAnchor { node_id: String },
}

/// A human turn marked as "try a different reply here".
///
/// Only [`ForkAnchor::new`] builds one, so every anchor was a human turn when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkAnchor {
    node_id: String,
}

impl ForkAnchor {
    /// Mark `node_id` as the anchor. Only existing human turns qualify.
    pub fn new(tree: &TurnTree, node_id: &str) -> Result<Self, ForkError> {
        let node = tree.get(node_id).ok_or_else(|| ForkError::UnknownTurn {
            node_id: node_id.to_string(),
        })?;
        if !node.record.is_human() {
            return Err(ForkError::AgentAnchor {
                node_id: node_id.to_string(),
            });
        }
        Ok(Self {
            node_id: node_id.to_string(),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionKind {
    /// One more turn at the end of an existing chain.
    Continuation,
    /// A sibling of the anchor, creating a divergence at its parent.
    Fork { anchor_node_id: String },
}

/// The parent a new human turn must carry, decided before the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPlan {
    pub parent_node_id: Option<String>,
    pub kind: SubmissionKind,
    /// Display ordinal for the new turn.
    pub turn_number: u32,
}

impl SubmissionPlan {
    pub fn is_fork(&self) -> bool {
        matches!(self.kind, SubmissionKind::Fork { .. })
    }
}

/// Decide where the next human message goes.
pub fn plan_submission(
    tree: &TurnTree,
    selection: Option<&str>,
    anchor: Option<&ForkAnchor>,
) -> Result<SubmissionPlan, ForkError> {
    match anchor {
        Some(anchor) => plan_fork(tree, anchor),
        None => plan_continuation(tree, selection),
    }
}

/// Continue the active line: the selection if it is a leaf, else the most
/// recent leaf below it; the main line's leaf when nothing is selected; a new
/// root when the tree is empty.
pub fn plan_continuation(
    tree: &TurnTree,
    selection: Option<&str>,
) -> Result<SubmissionPlan, ForkError> {
    let parent = match selection {
        Some(id) => {
            let idx = tree.index_of(id).ok_or_else(|| ForkError::UnknownTurn {
                node_id: id.to_string(),
            })?;
            Some(latest_leaf(tree, idx))
        }
        None => default_path(tree).last().copied(),
    };

    Ok(SubmissionPlan {
        parent_node_id: parent.map(|p| tree.node(p).node_id().to_string()),
        kind: SubmissionKind::Continuation,
        turn_number: next_turn_number(tree, parent),
    })
}

/// Fork beside the anchor: the new turn's parent is the anchor's parent. A
/// root anchor therefore starts a second, independent root.
pub fn plan_fork(tree: &TurnTree, anchor: &ForkAnchor) -> Result<SubmissionPlan, ForkError> {
    let Some(idx) = tree.index_of(anchor.node_id()) else {
        warn!(node_id = anchor.node_id(), "fork anchor no longer resolves");
        return Err(ForkError::StaleAnchor {
            node_id: anchor.node_id().to_string(),
        });
    };
    let parent = tree.node(idx).parent;
    if parent.is_none() {
        debug!(
            node_id = anchor.node_id(),
            "forking at a root, the reply starts a new conversation"
        );
    }

    Ok(SubmissionPlan {
        parent_node_id: parent.map(|p| tree.node(p).node_id().to_string()),
        kind: SubmissionKind::Fork {
            anchor_node_id: anchor.node_id().to_string(),
        },
        turn_number: tree.node(idx).record.turn_number.max(1),
    })
}

/// `idx` itself when it is a leaf, otherwise the newest leaf beneath it.
pub fn latest_leaf(tree: &TurnTree, idx: NodeIndex) -> NodeIndex {
    tree.leaves_under(idx)
        .into_iter()
        .max_by(|&a, &b| {
            let (ra, rb) = (&tree.node(a).record, &tree.node(b).record);
            ra.timestamp
                .cmp(&rb.timestamp)
                .then_with(|| ra.node_id.cmp(&rb.node_id))
        })
        .unwrap_or(idx)
}

fn next_turn_number(tree: &TurnTree, parent: Option<NodeIndex>) -> u32 {
    parent.map_or(1, |p| tree.node(p).record.turn_number.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{greeting_chain, human};
    use crate::tree::build_tree;

    #[test]
    fn continuation_attaches_to_leaf_of_main_line() {
        let tree = build_tree(&greeting_chain());
        let plan = plan_submission(&tree, None, None).expect("plan");
        assert_eq!(plan.parent_node_id.as_deref(), Some("n4"));
        assert_eq!(plan.kind, SubmissionKind::Continuation);
    }

    #[test]
    fn continuation_from_selected_leaf_uses_it() {
        let mut records = greeting_chain();
        records.push(human("n5", Some("n2"), 10, "alt"));
        let tree = build_tree(&records);

        let plan = plan_continuation(&tree, Some("n5")).expect("plan");
        assert_eq!(plan.parent_node_id.as_deref(), Some("n5"));
    }

    #[test]
    fn continuation_from_inner_selection_uses_latest_leaf() {
        let mut records = greeting_chain();
        records.push(human("n5", Some("n2"), 10, "alt"));
        let tree = build_tree(&records);

        let plan = plan_continuation(&tree, Some("n2")).expect("plan");
        assert_eq!(plan.parent_node_id.as_deref(), Some("n5"));

        let plan = plan_continuation(&tree, Some("n3")).expect("plan");
        assert_eq!(plan.parent_node_id.as_deref(), Some("n4"));
    }

    #[test]
    fn continuation_on_empty_tree_starts_root() {
        let tree = build_tree(&[]);
        let plan = plan_continuation(&tree, None).expect("plan");
        assert_eq!(plan.parent_node_id, None);
        assert_eq!(plan.turn_number, 1);
    }

    #[test]
    fn continuation_with_unknown_selection_fails() {
        let tree = build_tree(&greeting_chain());
        assert_eq!(
            plan_continuation(&tree, Some("ghost")),
            Err(ForkError::UnknownTurn {
                node_id: "ghost".to_string()
            })
        );
    }

    #[test]
    fn fork_at_inner_human_turn_targets_its_parent() {
        let tree = build_tree(&greeting_chain());
        let anchor = ForkAnchor::new(&tree, "n3").expect("anchor");

        let plan = plan_submission(&tree, Some("n4"), Some(&anchor)).expect("plan");
        assert_eq!(plan.parent_node_id.as_deref(), Some("n2"));
        assert!(plan.is_fork());
    }

    #[test]
    fn fork_at_root_starts_second_root() {
        let tree = build_tree(&greeting_chain());
        let anchor = ForkAnchor::new(&tree, "n1").expect("anchor");

        let plan = plan_fork(&tree, &anchor).expect("plan");
        assert_eq!(plan.parent_node_id, None);
    }

    #[test]
    fn agent_turn_cannot_anchor() {
        let tree = build_tree(&greeting_chain());
        assert_eq!(
            ForkAnchor::new(&tree, "n2"),
            Err(ForkError::AgentAnchor {
                node_id: "n2".to_string()
            })
        );
    }

    #[test]
    fn anchor_from_older_tree_is_stale() {
        let mut records = greeting_chain();
        records.push(human("n5", Some("n4"), 10, "more"));
        let old = build_tree(&records);
        let anchor = ForkAnchor::new(&old, "n5").expect("anchor");

        let tree = build_tree(&greeting_chain());
        assert_eq!(
            plan_fork(&tree, &anchor),
            Err(ForkError::StaleAnchor {
                node_id: "n5".to_string()
            })
        );
    }

    #[test]
    fn fork_then_rebuild_creates_divergence_at_parent() {
        let mut records = greeting_chain();
        let tree = build_tree(&records);
        let anchor = ForkAnchor::new(&tree, "n3").expect("anchor");
        let plan = plan_fork(&tree, &anchor).expect("plan");
        let before = tree.get("n2").map(|n| n.children.len()).unwrap_or(0);

        records.push(human("n5", plan.parent_node_id.as_deref(), 10, "different answer"));
        let tree = build_tree(&records);
        let n2 = tree.get("n2").expect("n2");
        assert_eq!(n2.children.len(), before + 1);
        assert!(n2.is_divergence());
    }
}

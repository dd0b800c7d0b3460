//! Parent/child tree built from a flat collection of turn records.
//!
//! The tree is an arena: every node lives in one `Vec` and refers to its
//! parent and children by [`NodeIndex`]. Indices are only meaningful for the
//! tree that produced them; callers outside a single snapshot should hold
//! node ids instead.

use crate::record::TurnRecord;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Position of a node in [`TurnTree`]'s arena.
pub type NodeIndex = usize;

/// A turn record plus its place in the tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub record: TurnRecord,
    pub parent: Option<NodeIndex>,
    /// Ascending by timestamp, ties broken by node id
    pub children: Vec<NodeIndex>,
    /// Distance from this node's root (roots are depth 0)
    pub depth: usize,
}

impl TreeNode {
    pub fn node_id(&self) -> &str {
        &self.record.node_id
    }

    /// Two or more turns could follow this one.
    pub fn is_divergence(&self) -> bool {
        self.children.len() > 1
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Structural problems found while building. None of them stop the build.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeAnomaly {
    /// `parent_node_id` names a turn that is not in the collection; the
    /// record was admitted as a root.
    OrphanedParent {
        node_id: String,
        parent_node_id: String,
    },
    /// A later record reused an id; only the first occurrence was kept.
    DuplicateNodeId { node_id: String },
    /// The record's parent chain loops back on itself; it was detached from
    /// its parent and admitted as a root.
    ParentCycle { node_id: String },
}

/// Everything the builder had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub anomalies: Vec<TreeAnomaly>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn orphans(&self) -> impl Iterator<Item = &str> {
        self.anomalies.iter().filter_map(|a| match a {
            TreeAnomaly::OrphanedParent { node_id, .. } => Some(node_id.as_str()),
            _ => None,
        })
    }
}

/// Rooted forest of turns.
#[derive(Debug, Clone, Default)]
pub struct TurnTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeIndex>,
    index: HashMap<String, NodeIndex>,
}

/// Build a tree, discarding the anomaly report (anomalies are still logged).
pub fn build_tree(records: &[TurnRecord]) -> TurnTree {
    build_tree_with_report(records).0
}

/// Build a tree from records in any order.
///
/// Every record with a unique id appears exactly once. Missing parents and
/// parent cycles turn the affected record into an extra root.
pub fn build_tree_with_report(records: &[TurnRecord]) -> (TurnTree, BuildReport) {
    let mut report = BuildReport::default();
    let mut nodes: Vec<TreeNode> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(records.len());

    for record in records {
        if index.contains_key(&record.node_id) {
            warn!(node_id = %record.node_id, "duplicate node id, keeping first occurrence");
            report.anomalies.push(TreeAnomaly::DuplicateNodeId {
                node_id: record.node_id.clone(),
            });
            continue;
        }
        index.insert(record.node_id.clone(), nodes.len());
        nodes.push(TreeNode {
            record: record.clone(),
            parent: None,
            children: Vec::new(),
            depth: 0,
        });
    }

    let mut roots = Vec::new();
    for i in 0..nodes.len() {
        let Some(parent_id) = nodes[i].record.parent_node_id.clone() else {
            roots.push(i);
            continue;
        };
        match index.get(&parent_id).copied() {
            Some(p) => {
                nodes[i].parent = Some(p);
                nodes[p].children.push(i);
            }
            None => {
                warn!(
                    node_id = %nodes[i].record.node_id,
                    parent_node_id = %parent_id,
                    "parent not found, treating turn as a root"
                );
                report.anomalies.push(TreeAnomaly::OrphanedParent {
                    node_id: nodes[i].record.node_id.clone(),
                    parent_node_id: parent_id,
                });
                roots.push(i);
            }
        }
    }

    break_cycles(&mut nodes, &mut roots, &mut report);

    for node_idx in 0..nodes.len() {
        let mut children = std::mem::take(&mut nodes[node_idx].children);
        children.sort_by(|&a, &b| sibling_order(&nodes[a].record, &nodes[b].record));
        nodes[node_idx].children = children;
    }
    roots.sort_by(|&a, &b| sibling_order(&nodes[a].record, &nodes[b].record));

    let mut tree = TurnTree {
        nodes,
        roots,
        index,
    };
    tree.assign_depths();
    debug!(
        nodes = tree.len(),
        roots = tree.roots.len(),
        anomalies = report.anomalies.len(),
        "turn tree built"
    );
    (tree, report)
}

fn sibling_order(a: &TurnRecord, b: &TurnRecord) -> std::cmp::Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.node_id.cmp(&b.node_id))
}

/// Nodes not reachable from any root sit on (or hang below) a parent cycle.
/// The earliest member of each cycle is cut loose and promoted to a root.
fn break_cycles(nodes: &mut [TreeNode], roots: &mut Vec<NodeIndex>, report: &mut BuildReport) {
    let mut reached = vec![false; nodes.len()];
    mark_reachable(nodes, roots, &mut reached);

    for start in 0..nodes.len() {
        if reached[start] {
            continue;
        }

        // Walk upward until a node repeats; everything from the first repeat
        // onward is the cycle.
        let mut walk = Vec::new();
        let mut on_walk = vec![false; nodes.len()];
        let mut cursor = start;
        while !on_walk[cursor] {
            on_walk[cursor] = true;
            walk.push(cursor);
            match nodes[cursor].parent {
                Some(p) => cursor = p,
                None => break,
            }
        }
        let cycle_start = walk.iter().position(|&n| n == cursor).unwrap_or(0);
        let Some(&victim) = walk[cycle_start..]
            .iter()
            .min_by(|&&a, &&b| sibling_order(&nodes[a].record, &nodes[b].record))
        else {
            continue;
        };

        if let Some(p) = nodes[victim].parent.take() {
            nodes[p].children.retain(|&c| c != victim);
        }
        warn!(node_id = %nodes[victim].record.node_id, "parent cycle, treating turn as a root");
        report.anomalies.push(TreeAnomaly::ParentCycle {
            node_id: nodes[victim].record.node_id.clone(),
        });
        roots.push(victim);
        mark_reachable(nodes, &[victim], &mut reached);
    }
}

fn mark_reachable(nodes: &[TreeNode], from: &[NodeIndex], reached: &mut [bool]) {
    let mut stack: Vec<NodeIndex> = from.to_vec();
    while let Some(n) = stack.pop() {
        if reached[n] {
            continue;
        }
        reached[n] = true;
        stack.extend(nodes[n].children.iter().copied());
    }
}

impl TurnTree {
    fn assign_depths(&mut self) {
        let mut queue: VecDeque<(NodeIndex, usize)> =
            self.roots.iter().map(|&r| (r, 0)).collect();
        while let Some((n, depth)) = queue.pop_front() {
            self.nodes[n].depth = depth;
            for &c in &self.nodes[n].children {
                queue.push_back((c, depth + 1));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Roots ordered by timestamp.
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn node(&self, idx: NodeIndex) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, node_id: &str) -> Option<NodeIndex> {
        self.index.get(node_id).copied()
    }

    pub fn get(&self, node_id: &str) -> Option<&TreeNode> {
        self.index_of(node_id).map(|i| &self.nodes[i])
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    /// Nodes in arena order (input order, duplicates removed).
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = &TreeNode> {
        self.nodes[idx].children.iter().map(|&c| &self.nodes[c])
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<&TreeNode> {
        self.nodes[idx].parent.map(|p| &self.nodes[p])
    }

    /// Pre-order walk of the whole forest, siblings in timestamp order.
    pub fn depth_first(&self) -> Vec<NodeIndex> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            out.extend(self.subtree(root));
        }
        out
    }

    /// Pre-order walk of the subtree rooted at `idx`, `idx` first.
    pub fn subtree(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().rev().copied());
        }
        out
    }

    /// All divergence points in pre-order.
    pub fn divergences(&self) -> Vec<NodeIndex> {
        self.depth_first()
            .into_iter()
            .filter(|&n| self.nodes[n].is_divergence())
            .collect()
    }

    /// Leaves of the subtree rooted at `idx`, in pre-order.
    pub fn leaves_under(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.subtree(idx)
            .into_iter()
            .filter(|&n| self.nodes[n].is_leaf())
            .collect()
    }
}

pub fn is_divergence(node: &TreeNode) -> bool {
    node.is_divergence()
}

pub fn is_leaf(node: &TreeNode) -> bool {
    node.is_leaf()
}

/// Number of turns in the subtree rooted at `idx`, including `idx` itself.
pub fn count_subtree_turns(tree: &TurnTree, idx: NodeIndex) -> usize {
    let mut count = 0;
    let mut stack = vec![idx];
    while let Some(n) = stack.pop() {
        count += 1;
        stack.extend(tree.node(n).children.iter().copied());
    }
    count
}

/// The straight run starting at `idx`: `idx`, then its only child, and so on
/// while the current node has exactly one child. The last element is the
/// first node that is a leaf or a divergence.
pub fn compute_linear_run(tree: &TurnTree, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut run = vec![idx];
    let mut cursor = idx;
    while let [only] = tree.node(cursor).children.as_slice() {
        cursor = *only;
        run.push(cursor);
    }
    run
}

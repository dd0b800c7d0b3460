//! Which divergences are hidden and which long straight runs are folded.
//!
//! [`CollapseState`] is a plain set of [`CollapseKey`]s kept beside the tree,
//! never inside it. Every operation takes the tree and the current selection
//! explicitly, so `(records, selection, prior state)` fully determines the
//! result.

use crate::ancestry::{ancestry_path, default_path};
use crate::tree::{NodeIndex, TurnTree, compute_linear_run};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const DIVERGE_PREFIX: &str = "diverge:";
const LINEAR_PREFIX: &str = "linear:";

/// Thresholds for automatic collapsing and folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseSettings {
    /// Divergences deeper than this are collapsed when first seen.
    pub divergence_depth_threshold: usize,
    /// Runs longer than this are folded.
    pub linear_run_threshold: usize,
    /// Turns left visible at the start of a folded run.
    pub fold_head: usize,
    /// Turns left visible at the end of a folded run.
    pub fold_tail: usize,
}

impl Default for CollapseSettings {
    fn default() -> Self {
        Self {
            divergence_depth_threshold: 2,
            linear_run_threshold: 6,
            fold_head: 2,
            fold_tail: 2,
        }
    }
}

impl CollapseSettings {
    /// `(head, hidden, tail)` for a run of `len` turns, or `None` when the
    /// run is too short to fold or folding would hide nothing.
    pub fn fold_split(&self, len: usize) -> Option<(usize, usize, usize)> {
        if len <= self.linear_run_threshold {
            return None;
        }
        let shown = self.fold_head + self.fold_tail;
        if shown >= len {
            return None;
        }
        Some((self.fold_head, len - shown, self.fold_tail))
    }
}

/// A collapse decision, namespaced by reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollapseKey {
    /// The branches below a divergence are hidden.
    Diverge(String),
    /// The middle of the linear run headed by this node is folded.
    Linear(String),
}

impl CollapseKey {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Diverge(id) | Self::Linear(id) => id,
        }
    }
}

impl fmt::Display for CollapseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diverge(id) => write!(f, "{DIVERGE_PREFIX}{id}"),
            Self::Linear(id) => write!(f, "{LINEAR_PREFIX}{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid collapse key {0:?}: expected diverge:<id> or linear:<id>")]
pub struct CollapseKeyParseError(pub String);

impl FromStr for CollapseKey {
    type Err = CollapseKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if let Some(id) = s.strip_prefix(DIVERGE_PREFIX) {
            Some(Self::Diverge(id.to_string()))
        } else {
            s.strip_prefix(LINEAR_PREFIX)
                .map(|id| Self::Linear(id.to_string()))
        };
        match parsed {
            Some(key) if !key.node_id().is_empty() => Ok(key),
            _ => Err(CollapseKeyParseError(s.to_string())),
        }
    }
}

/// A maximal straight run, from a run head to the first leaf or divergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearRun {
    pub nodes: Vec<NodeIndex>,
}

impl LinearRun {
    pub fn head(&self) -> NodeIndex {
        self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn key(&self, tree: &TurnTree) -> CollapseKey {
        CollapseKey::Linear(tree.node(self.head()).node_id().to_string())
    }

    /// Nodes hidden when this run is folded.
    pub fn hidden(&self, settings: &CollapseSettings) -> &[NodeIndex] {
        match settings.fold_split(self.len()) {
            Some((head, hidden, _)) => &self.nodes[head..head + hidden],
            None => &[],
        }
    }
}

/// Roots and the children of divergences start runs.
fn is_run_head(tree: &TurnTree, idx: NodeIndex) -> bool {
    tree.parent(idx).is_none_or(|p| p.is_divergence())
}

/// Every maximal linear run in the forest, in pre-order of their heads.
pub fn linear_runs(tree: &TurnTree) -> Vec<LinearRun> {
    tree.depth_first()
        .into_iter()
        .filter(|&idx| is_run_head(tree, idx))
        .map(|idx| LinearRun {
            nodes: compute_linear_run(tree, idx),
        })
        .collect()
}

/// Nodes that must stay visible: the selection's ancestry, or the main line
/// when nothing is selected.
fn protected_path<'a>(tree: &'a TurnTree, selection: Option<&str>) -> HashSet<&'a str> {
    match selection {
        Some(id) => ancestry_path(tree, id),
        None => default_path(tree)
            .into_iter()
            .map(|idx| tree.node(idx).node_id())
            .collect(),
    }
}

/// The set of collapsed keys plus the nodes the policy has already judged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    collapsed: BTreeSet<CollapseKey>,
    evaluated: HashSet<CollapseKey>,
}

impl CollapseState {
    /// Seed the state for a freshly built tree.
    ///
    /// Decisions in `prior` survive for nodes that still qualify. A divergence
    /// on the protected path is never collapsed, even if `prior` had it
    /// collapsed. Divergences deeper than the threshold and off the protected
    /// path are collapsed the first time they are seen; long runs are folded the first time they
    /// qualify, unless the selection sits in their hidden middle.
    pub fn seed(
        tree: &TurnTree,
        selection: Option<&str>,
        settings: &CollapseSettings,
        prior: Option<&CollapseState>,
    ) -> Self {
        let protected = protected_path(tree, selection);
        let mut state = CollapseState::default();

        for idx in tree.divergences() {
            let node = tree.node(idx);
            let key = CollapseKey::Diverge(node.node_id().to_string());
            let seen_before = prior.is_some_and(|p| p.evaluated.contains(&key));
            let collapse = !protected.contains(node.node_id())
                && if seen_before {
                    prior.is_some_and(|p| p.collapsed.contains(&key))
                } else {
                    node.depth > settings.divergence_depth_threshold
                };
            if collapse {
                state.collapsed.insert(key.clone());
            }
            state.evaluated.insert(key);
        }

        for run in linear_runs(tree) {
            if settings.fold_split(run.len()).is_none() {
                continue;
            }
            let key = run.key(tree);
            let seen_before = prior.is_some_and(|p| p.evaluated.contains(&key));
            let fold = if seen_before {
                prior.is_some_and(|p| p.collapsed.contains(&key))
            } else {
                !selection_hidden_in(tree, &run, selection, settings)
            };
            if fold {
                state.collapsed.insert(key.clone());
            }
            state.evaluated.insert(key);
        }

        debug!(
            collapsed = state.collapsed.len(),
            evaluated = state.evaluated.len(),
            "collapse state seeded"
        );
        state
    }

    /// Make the selection reachable: open every divergence on its ancestry and
    /// unfold a run whose hidden middle contains it.
    pub fn reveal_selection(
        &mut self,
        tree: &TurnTree,
        selection: &str,
        settings: &CollapseSettings,
    ) {
        let path = ancestry_path(tree, selection);
        for id in &path {
            self.collapsed.remove(&CollapseKey::Diverge((*id).to_string()));
        }
        for run in linear_runs(tree) {
            if selection_hidden_in(tree, &run, Some(selection), settings) {
                self.collapsed.remove(&run.key(tree));
            }
        }
        debug!(node_id = selection, "selection revealed");
    }

    /// Flip one key. Returns whether it is collapsed afterwards.
    pub fn toggle(&mut self, key: CollapseKey) -> bool {
        if self.collapsed.remove(&key) {
            false
        } else {
            self.collapsed.insert(key);
            true
        }
    }

    /// Collapse every divergence not on the protected path, at any depth.
    pub fn collapse_all(&mut self, tree: &TurnTree, selection: Option<&str>) {
        let protected = protected_path(tree, selection);
        for idx in tree.divergences() {
            let node = tree.node(idx);
            let key = CollapseKey::Diverge(node.node_id().to_string());
            if protected.contains(node.node_id()) {
                self.collapsed.remove(&key);
            } else {
                self.collapsed.insert(key.clone());
            }
            self.evaluated.insert(key);
        }
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    pub fn is_collapsed(&self, key: &CollapseKey) -> bool {
        self.collapsed.contains(key)
    }

    pub fn is_divergence_collapsed(&self, node_id: &str) -> bool {
        self.collapsed
            .contains(&CollapseKey::Diverge(node_id.to_string()))
    }

    pub fn is_run_folded(&self, head_id: &str) -> bool {
        self.collapsed.contains(&CollapseKey::Linear(head_id.to_string()))
    }

    /// Collapsed keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &CollapseKey> {
        self.collapsed.iter()
    }

    pub fn len(&self) -> usize {
        self.collapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty()
    }
}

fn selection_hidden_in(
    tree: &TurnTree,
    run: &LinearRun,
    selection: Option<&str>,
    settings: &CollapseSettings,
) -> bool {
    let Some(selected) = selection.and_then(|id| tree.index_of(id)) else {
        return false;
    };
    run.hidden(settings).contains(&selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{agent, chain, chain_from, human};
    use crate::tree::build_tree;

    fn diverge(id: &str) -> CollapseKey {
        CollapseKey::Diverge(id.to_string())
    }

    fn linear(id: &str) -> CollapseKey {
        CollapseKey::Linear(id.to_string())
    }

    /// n1..n6 main line, a deep fork at n4 (depth 3) and a shallow fork at n2
    /// (depth 1).
    fn forked_records() -> Vec<crate::TurnRecord> {
        let mut records = chain(6);
        records.push(human("deep", Some("n4"), 100, "deep alt"));
        records.push(agent("deep-r", Some("deep"), 101, "deep reply"));
        records.push(human("shallow", Some("n2"), 102, "shallow alt"));
        records
    }

    #[test]
    fn collapse_key_round_trips_through_display() {
        let key: CollapseKey = "diverge:n7".parse().expect("parse");
        assert_eq!(key, diverge("n7"));
        assert_eq!(key.to_string(), "diverge:n7");
        assert_eq!("linear:a:b".parse::<CollapseKey>(), Ok(linear("a:b")));
        assert!("fold:n1".parse::<CollapseKey>().is_err());
        assert!("linear:".parse::<CollapseKey>().is_err());
    }

    #[test]
    fn seed_collapses_only_deep_divergences_off_path() {
        let tree = build_tree(&forked_records());
        let state = CollapseState::seed(&tree, Some("deep-r"), &CollapseSettings::default(), None);
        assert!(!state.is_divergence_collapsed("n4"));
        assert!(!state.is_divergence_collapsed("n2"));

        let state = CollapseState::seed(&tree, Some("shallow"), &CollapseSettings::default(), None);
        assert!(state.is_divergence_collapsed("n4"));
        assert!(!state.is_divergence_collapsed("n2"));
    }

    #[test]
    fn seed_without_selection_protects_main_line() {
        let mut records = forked_records();
        // Deep fork that hangs off the shallow branch, away from the main line.
        records.extend(chain_from("s", Some("shallow"), 200, 4));
        records.push(human("s-alt", Some("s3"), 300, "alt"));
        let tree = build_tree(&records);

        let state = CollapseState::seed(&tree, None, &CollapseSettings::default(), None);
        assert!(!state.is_divergence_collapsed("n4"));
        assert!(state.is_divergence_collapsed("s3"));
    }

    #[test]
    fn selection_reveals_collapsed_ancestors() {
        let tree = build_tree(&forked_records());
        let settings = CollapseSettings::default();
        let mut state = CollapseState::seed(&tree, Some("shallow"), &settings, None);
        assert!(state.is_divergence_collapsed("n4"));

        state.reveal_selection(&tree, "deep-r", &settings);
        assert!(!state.is_divergence_collapsed("n4"));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut state = CollapseState::default();
        assert!(state.toggle(diverge("n2")));
        assert!(state.is_collapsed(&diverge("n2")));
        assert!(!state.toggle(diverge("n2")));
        assert!(state.is_empty());
    }

    #[test]
    fn collapse_all_skips_protected_path_and_expand_all_clears() {
        let tree = build_tree(&forked_records());
        let mut state = CollapseState::default();

        state.collapse_all(&tree, Some("shallow"));
        assert!(state.is_divergence_collapsed("n4"));
        assert!(!state.is_divergence_collapsed("n2"));

        state.expand_all();
        assert!(state.is_empty());
    }

    #[test]
    fn long_run_is_folded_on_seed() {
        let tree = build_tree(&chain(8));
        let state = CollapseState::seed(&tree, None, &CollapseSettings::default(), None);
        assert!(state.is_run_folded("n1"));

        let short = build_tree(&chain(6));
        let state = CollapseState::seed(&short, None, &CollapseSettings::default(), None);
        assert!(state.is_empty());
    }

    #[test]
    fn run_containing_selection_in_middle_stays_unfolded() {
        let tree = build_tree(&chain(8));
        let settings = CollapseSettings::default();
        let state = CollapseState::seed(&tree, Some("n4"), &settings, None);
        assert!(!state.is_run_folded("n1"));

        let mut state = CollapseState::seed(&tree, None, &settings, None);
        state.reveal_selection(&tree, "n5", &settings);
        assert!(!state.is_run_folded("n1"));
    }

    #[test]
    fn reseed_keeps_user_decisions_and_collapses_new_divergences() {
        let settings = CollapseSettings::default();
        let mut records = forked_records();
        let tree = build_tree(&records);
        let mut state = CollapseState::seed(&tree, Some("shallow"), &settings, None);

        // User opens the deep fork by hand.
        assert!(!state.toggle(diverge("n4")));

        // A new deep divergence appears at n5.
        records.push(human("late", Some("n5"), 400, "late alt"));
        let tree = build_tree(&records);
        let state = CollapseState::seed(&tree, Some("shallow"), &settings, Some(&state));

        assert!(!state.is_divergence_collapsed("n4"));
        assert!(state.is_divergence_collapsed("n5"));
    }

    #[test]
    fn reseed_reopens_divergence_that_joins_main_line() {
        let settings = CollapseSettings::default();
        let mut records = crate::testing::greeting_chain();
        records.push(human("m2", Some("m1"), 5, "orphan"));
        records.push(agent("m3", Some("m2"), 6, "first"));
        records.push(agent("m4", Some("m2"), 7, "second"));
        let tree = build_tree(&records);
        let mut state = CollapseState::seed(&tree, None, &settings, None);
        assert!(state.toggle(diverge("m2")));

        let state = CollapseState::seed(&tree, None, &settings, Some(&state));
        assert!(state.is_divergence_collapsed("m2"));

        // The missing parent arrives earlier than n1 and becomes the main line.
        records.push(human("m1", None, 0, "earlier start"));
        let tree = build_tree(&records);
        let state = CollapseState::seed(&tree, None, &settings, Some(&state));
        assert!(!state.is_divergence_collapsed("m2"));
    }

    #[test]
    fn linear_runs_start_at_roots_and_branch_heads() {
        let tree = build_tree(&forked_records());
        let heads: Vec<&str> = linear_runs(&tree)
            .iter()
            .map(|run| tree.node(run.head()).node_id())
            .collect();
        assert_eq!(heads, vec!["n1", "n3", "n5", "deep", "shallow"]);
    }

    #[test]
    fn fold_split_never_hides_nothing() {
        let settings = CollapseSettings {
            linear_run_threshold: 3,
            fold_head: 2,
            fold_tail: 2,
            ..CollapseSettings::default()
        };
        assert_eq!(settings.fold_split(4), None);
        assert_eq!(settings.fold_split(5), Some((2, 1, 2)));
        assert_eq!(CollapseSettings::default().fold_split(8), Some((2, 4, 2)));
        assert_eq!(CollapseSettings::default().fold_split(6), None);
    }
}

//! Conversation execution tree.
//!
//! Builds a parent/child tree from flat turn records, resolves ancestry for
//! linear playback, decides which branches and long runs stay collapsed, and
//! plans where a new human message attaches (continuation or fork).

pub mod ancestry;
pub mod branches;
pub mod collapse;
pub mod fork;
pub mod jsonl;
pub mod playback;
pub mod record;
pub mod rows;
pub mod simulation;
pub mod stats;
pub mod tree;
pub mod validate;

pub use ancestry::{ancestry_chain, ancestry_path, default_path};
pub use collapse::{CollapseKey, CollapseSettings, CollapseState, LinearRun, linear_runs};
pub use fork::{ForkAnchor, ForkError, SubmissionKind, SubmissionPlan, plan_submission};
pub use playback::{playback_path, playback_records};
pub use record::{Speaker, TurnRecord, TurnStatus};
pub use rows::{DisplayRow, RowMarker, visible_rows};
pub use simulation::{Simulation, SimulationError};
pub use tree::{
    BuildReport, NodeIndex, TreeAnomaly, TreeNode, TurnTree, build_tree, build_tree_with_report,
    compute_linear_run, count_subtree_turns, is_divergence, is_leaf,
};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

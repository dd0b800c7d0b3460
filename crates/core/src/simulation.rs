//! One consistent snapshot of a simulated conversation.
//!
//! [`Simulation`] owns the record collection and everything derived from it.
//! The tree is rebuilt from scratch whenever records change; selection and
//! collapse state are re-derived from `(records, selection, prior state)`.

use crate::collapse::{CollapseKey, CollapseSettings, CollapseState};
use crate::fork::{ForkAnchor, ForkError, SubmissionPlan, plan_submission};
use crate::playback::{playback_path, playback_records};
use crate::record::TurnRecord;
use crate::rows::{DisplayRow, visible_rows};
use crate::tree::{BuildReport, NodeIndex, TurnTree, build_tree_with_report};
use crate::validate::{ValidationError, validate_batch};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimulationError {
    #[error("rejected batch of {count} record(s): {}", summarize(.errors))]
    Rejected {
        count: usize,
        errors: Vec<ValidationError>,
    },
    #[error("turn {node_id} not found")]
    UnknownTurn { node_id: String },
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct Simulation {
    records: Vec<TurnRecord>,
    tree: TurnTree,
    report: BuildReport,
    selection: Option<String>,
    collapse: CollapseState,
    settings: CollapseSettings,
}

impl Simulation {
    pub fn new(settings: CollapseSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Snapshot over an existing collection, e.g. a loaded record file.
    /// Structural anomalies are repaired by the builder, not rejected.
    pub fn from_records(records: Vec<TurnRecord>, settings: CollapseSettings) -> Self {
        let mut sim = Self::new(settings);
        sim.records = records;
        sim.rebuild();
        sim
    }

    /// Add new records. The whole batch is validated first and either joins
    /// the collection completely or not at all.
    pub fn ingest(&mut self, incoming: Vec<TurnRecord>) -> Result<(), SimulationError> {
        if let Err(errors) = validate_batch(&self.records, &incoming) {
            warn!(count = incoming.len(), "rejected turn record batch");
            return Err(SimulationError::Rejected {
                count: incoming.len(),
                errors,
            });
        }
        self.records.extend(incoming);
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        let (tree, report) = build_tree_with_report(&self.records);
        self.tree = tree;
        self.report = report;
        if let Some(id) = &self.selection {
            if !self.tree.contains(id) {
                debug!(node_id = %id, "selection vanished on rebuild");
                self.selection = None;
            }
        }
        self.collapse = CollapseState::seed(
            &self.tree,
            self.selection.as_deref(),
            &self.settings,
            Some(&self.collapse),
        );
        if let Some(id) = &self.selection {
            self.collapse.reveal_selection(&self.tree, id, &self.settings);
        }
    }

    /// Select a turn and open everything hiding it.
    pub fn select(&mut self, node_id: &str) -> Result<(), SimulationError> {
        if !self.tree.contains(node_id) {
            return Err(SimulationError::UnknownTurn {
                node_id: node_id.to_string(),
            });
        }
        self.selection = Some(node_id.to_string());
        self.collapse
            .reveal_selection(&self.tree, node_id, &self.settings);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Flip a divergence or fold. Returns whether it is collapsed afterwards.
    pub fn toggle(&mut self, key: CollapseKey) -> bool {
        self.collapse.toggle(key)
    }

    pub fn collapse_all(&mut self) {
        self.collapse
            .collapse_all(&self.tree, self.selection.as_deref());
    }

    pub fn expand_all(&mut self) {
        self.collapse.expand_all();
    }

    pub fn playback_path(&self) -> Vec<NodeIndex> {
        playback_path(&self.tree, self.selection.as_deref())
    }

    pub fn playback(&self) -> Vec<&TurnRecord> {
        playback_records(&self.tree, self.selection.as_deref())
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        visible_rows(&self.tree, &self.collapse, &self.settings)
    }

    /// Where the next human message attaches under the current selection.
    pub fn plan_submission(
        &self,
        anchor: Option<&ForkAnchor>,
    ) -> Result<SubmissionPlan, ForkError> {
        plan_submission(&self.tree, self.selection.as_deref(), anchor)
    }

    pub fn tree(&self) -> &TurnTree {
        &self.tree
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn collapse(&self) -> &CollapseState {
        &self.collapse
    }

    pub fn settings(&self) -> &CollapseSettings {
        &self.settings
    }
}

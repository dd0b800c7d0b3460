use anyhow::{Context, Result};
use std::path::Path;
use turntree_core::jsonl::load_records;
use turntree_core::{CollapseSettings, Simulation, TreeAnomaly};

/// Load a record file into a snapshot, optionally selecting a turn.
pub fn open_simulation(
    file: &Path,
    settings: CollapseSettings,
    select: Option<&str>,
) -> Result<Simulation> {
    let records =
        load_records(file).with_context(|| format!("Failed to read {}", file.display()))?;
    tracing::debug!(path = %file.display(), records = records.len(), "loaded records");

    let mut sim = Simulation::from_records(records, settings);
    if let Some(id) = select {
        sim.select(id)
            .with_context(|| format!("cannot select turn in {}", file.display()))?;
    }
    Ok(sim)
}

pub fn describe_anomaly(anomaly: &TreeAnomaly) -> String {
    match anomaly {
        TreeAnomaly::OrphanedParent {
            node_id,
            parent_node_id,
        } => format!("{node_id}: parent {parent_node_id} is missing, shown as a root"),
        TreeAnomaly::DuplicateNodeId { node_id } => {
            format!("{node_id}: duplicate node id, later copy ignored")
        }
        TreeAnomaly::ParentCycle { node_id } => {
            format!("{node_id}: parent chain loops, shown as a root")
        }
        other => format!("{other:?}"),
    }
}

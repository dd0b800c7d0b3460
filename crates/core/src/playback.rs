//! The single chain of turns shown as "the conversation so far".

use crate::ancestry::{ancestry_chain, default_path};
use crate::record::TurnRecord;
use crate::tree::{NodeIndex, TurnTree};
use tracing::warn;

/// Root-to-selection chain, or the main line when nothing (or an unknown
/// turn) is selected. Never contains two siblings.
pub fn playback_path(tree: &TurnTree, selection: Option<&str>) -> Vec<NodeIndex> {
    match selection {
        Some(id) if tree.contains(id) => ancestry_chain(tree, id),
        Some(id) => {
            warn!(node_id = id, "selected turn not in tree, playing the main line");
            default_path(tree)
        }
        None => default_path(tree),
    }
}

pub fn playback_records<'a>(tree: &'a TurnTree, selection: Option<&str>) -> Vec<&'a TurnRecord> {
    playback_path(tree, selection)
        .into_iter()
        .map(|idx| &tree.node(idx).record)
        .collect()
}

use crate::collapse::linear_runs;
use crate::record::{Speaker, TurnStatus};
use crate::tree::TurnTree;
use serde::Serialize;

/// Shape and health of a turn tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub turn_count: u64,
    pub root_count: u64,
    pub leaf_count: u64,
    pub divergence_count: u64,
    pub max_depth: u64,
    pub longest_linear_run: u64,
    pub human_turns: u64,
    pub agent_turns: u64,
    pub valid_turns: u64,
    pub drifted_turns: u64,
    pub invalid_turns: u64,
}

pub fn tree_stats(tree: &TurnTree) -> TreeStats {
    let mut stats = TreeStats {
        turn_count: tree.len() as u64,
        root_count: tree.roots().len() as u64,
        ..TreeStats::default()
    };

    for node in tree.nodes() {
        if node.is_leaf() {
            stats.leaf_count += 1;
        }
        if node.is_divergence() {
            stats.divergence_count += 1;
        }
        stats.max_depth = stats.max_depth.max(node.depth as u64);
        match node.record.speaker() {
            Speaker::Human => stats.human_turns += 1,
            Speaker::Agent => stats.agent_turns += 1,
        }
        match node.record.status {
            TurnStatus::Valid => stats.valid_turns += 1,
            TurnStatus::Drifted => stats.drifted_turns += 1,
            TurnStatus::Invalid => stats.invalid_turns += 1,
        }
    }

    stats.longest_linear_run = linear_runs(tree)
        .iter()
        .map(|run| run.len() as u64)
        .max()
        .unwrap_or(0);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{agent, chain, greeting_chain, human};
    use crate::tree::build_tree;

    #[test]
    fn stats_for_forked_conversation() {
        let mut records = greeting_chain();
        records.push(human("n5", Some("n2"), 10, "different answer"));
        let mut drifted = agent("n6", Some("n5"), 11, "off topic");
        drifted.status = TurnStatus::Drifted;
        records.push(drifted);
        let stats = tree_stats(&build_tree(&records));

        assert_eq!(stats.turn_count, 6);
        assert_eq!(stats.root_count, 1);
        assert_eq!(stats.leaf_count, 2);
        assert_eq!(stats.divergence_count, 1);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.human_turns, 3);
        assert_eq!(stats.agent_turns, 3);
        assert_eq!(stats.drifted_turns, 1);
        assert_eq!(stats.valid_turns, 5);
        assert_eq!(stats.longest_linear_run, 2);
    }

    #[test]
    fn longest_run_of_straight_chain_is_whole_chain() {
        let stats = tree_stats(&build_tree(&chain(9)));
        assert_eq!(stats.longest_linear_run, 9);
        assert_eq!(stats.divergence_count, 0);
    }

    #[test]
    fn empty_tree_stats_are_zero() {
        assert_eq!(tree_stats(&build_tree(&[])), TreeStats::default());
    }
}

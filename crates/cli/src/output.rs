use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use turntree_core::{DisplayRow, RowMarker, Speaker, TreeNode, TurnRecord, TurnTree};

/// Output format for read commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Structured output envelope.
#[derive(Debug, Serialize)]
pub struct OutputEnvelope<T: Serialize> {
    pub version: &'static str,
    #[serde(rename = "type")]
    pub data_type: &'static str,
    pub data: T,
}

impl<T: Serialize> OutputEnvelope<T> {
    pub fn new(data_type: &'static str, data: T) -> Self {
        Self {
            version: "0.1",
            data_type,
            data,
        }
    }
}

pub fn print_json<T: Serialize>(data_type: &'static str, data: T) -> Result<()> {
    let envelope = OutputEnvelope::new(data_type, data);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// One turn as shown to users.
#[derive(Debug, Serialize)]
pub struct TurnView<'a> {
    pub node_id: &'a str,
    pub parent_node_id: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub speaker: &'static str,
    pub turn_number: u32,
    pub timestamp: String,
    pub status: &'static str,
    pub text: &'a str,
}

impl<'a> TurnView<'a> {
    pub fn new(record: &'a TurnRecord, labels: &'a HashMap<String, String>) -> Self {
        Self {
            node_id: &record.node_id,
            parent_node_id: record.parent_node_id.as_deref(),
            branch: labels.get(&record.node_id).map(String::as_str),
            speaker: speaker_name(record.speaker()),
            turn_number: record.turn_number,
            timestamp: record.timestamp.to_rfc3339(),
            status: record.status.as_str(),
            text: record.text(),
        }
    }
}

/// One display row, tagged by kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowView<'a> {
    Turn {
        level: usize,
        marker: &'static str,
        #[serde(flatten)]
        turn: TurnView<'a>,
    },
    Fold {
        level: usize,
        key: String,
        hidden: usize,
        first_hidden: &'a str,
        last_hidden: &'a str,
        subtree_turns: usize,
    },
    CollapsedBranches {
        level: usize,
        key: String,
        branches: usize,
        hidden_turns: usize,
    },
}

impl<'a> RowView<'a> {
    pub fn new(tree: &'a TurnTree, row: &DisplayRow, labels: &'a HashMap<String, String>) -> Self {
        match row {
            DisplayRow::Turn {
                node,
                level,
                marker,
            } => RowView::Turn {
                level: *level,
                marker: marker_name(*marker),
                turn: TurnView::new(&tree.node(*node).record, labels),
            },
            DisplayRow::Fold {
                key,
                level,
                hidden,
                first_hidden,
                last_hidden,
                subtree_turns,
            } => RowView::Fold {
                level: *level,
                key: key.to_string(),
                hidden: *hidden,
                first_hidden: tree.node(*first_hidden).node_id(),
                last_hidden: tree.node(*last_hidden).node_id(),
                subtree_turns: *subtree_turns,
            },
            DisplayRow::CollapsedBranches {
                key,
                level,
                branches,
                hidden_turns,
                ..
            } => RowView::CollapsedBranches {
                level: *level,
                key: key.to_string(),
                branches: *branches,
                hidden_turns: *hidden_turns,
            },
        }
    }
}

pub fn speaker_name(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::Human => "human",
        Speaker::Agent => "agent",
    }
}

fn marker_name(marker: RowMarker) -> &'static str {
    match marker {
        RowMarker::None => "none",
        RowMarker::Divergence => "divergence",
        RowMarker::BranchStart => "branch_start",
    }
}

fn marker_glyph(marker: RowMarker) -> char {
    match marker {
        RowMarker::None => '-',
        RowMarker::Divergence => '*',
        RowMarker::BranchStart => '+',
    }
}

/// Render one row as an indented text line.
pub fn render_row(
    tree: &TurnTree,
    row: &DisplayRow,
    labels: &HashMap<String, String>,
    selection: Option<&str>,
) -> String {
    let indent = "  ".repeat(row.level());
    match row {
        DisplayRow::Turn { node, marker, .. } => {
            let node = tree.node(*node);
            let cursor = if selection == Some(node.node_id()) { ">" } else { " " };
            format!(
                "{cursor}{indent}{} {}",
                marker_glyph(*marker),
                render_turn(node, labels)
            )
        }
        DisplayRow::Fold { key, .. } | DisplayRow::CollapsedBranches { key, .. } => format!(
            " {indent}  ... {} [{key}]",
            row.indicator().unwrap_or_default()
        ),
    }
}

/// `node_id [branch] speaker: text`, with long text shortened.
pub fn render_turn(node: &TreeNode, labels: &HashMap<String, String>) -> String {
    let record = &node.record;
    let branch = labels
        .get(&record.node_id)
        .map(|label| format!(" [{label}]"))
        .unwrap_or_default();
    let status = match record.status.as_str() {
        "VALID" => String::new(),
        other => format!(" ({other})"),
    };
    format!(
        "{}{branch} {}: {}{status}",
        record.node_id,
        speaker_name(record.speaker()),
        truncate(record.text(), 60)
    )
}

/// First line of `text`, cut at `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let cut = line.char_indices().nth(max).map(|(i, _)| i);
    match cut {
        Some(i) => format!("{}…", &line[..i]),
        None if line.len() < text.trim_end().len() => format!("{line}…"),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntree_core::build_tree;
    use turntree_core::testing::{greeting_chain, human};

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        assert_eq!(truncate("héllo wörld", 5), "héllo…");
    }

    #[test]
    fn truncate_marks_dropped_lines() {
        assert_eq!(truncate("first\nsecond", 60), "first…");
    }

    #[test]
    fn turn_line_shows_branch_and_status() {
        let mut records = greeting_chain();
        records[2].status = turntree_core::TurnStatus::Drifted;
        let tree = build_tree(&records);
        let labels = turntree_core::branches::branch_labels(&tree);
        let line = render_turn(tree.get("n3").expect("n3"), &labels);
        assert_eq!(line, "n3 [main] human: ok (DRIFTED)");
    }

    #[test]
    fn turn_view_serializes_flat_fields() {
        let record = human("n1", None, 0, "hi");
        let labels = HashMap::new();
        let value = serde_json::to_value(TurnView::new(&record, &labels)).expect("json");
        assert_eq!(value["node_id"], "n1");
        assert_eq!(value["speaker"], "human");
        assert_eq!(value["status"], "VALID");
        assert!(value["branch"].is_null());
    }
}

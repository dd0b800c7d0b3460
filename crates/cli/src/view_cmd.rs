use crate::output::{OutputFormat, RowView, TurnView, print_json, render_row, render_turn};
use crate::records::{describe_anomaly, open_simulation};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use turntree_core::branches::{branch_labels, branches};
use turntree_core::{CollapseKey, CollapseSettings};

/// How the `tree` command should adjust collapse state before rendering.
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    pub select: Option<String>,
    pub toggle: Vec<CollapseKey>,
    pub expand_all: bool,
    pub collapse_all: bool,
}

/// Run the `tree` command.
pub fn run_tree(
    file: &Path,
    settings: CollapseSettings,
    options: &TreeOptions,
    format: OutputFormat,
) -> Result<()> {
    let mut sim = open_simulation(file, settings, options.select.as_deref())?;
    if options.collapse_all {
        sim.collapse_all();
    }
    if options.expand_all {
        sim.expand_all();
    }
    for key in &options.toggle {
        let collapsed = sim.toggle(key.clone());
        tracing::debug!(%key, collapsed, "toggled");
    }

    let tree = sim.tree();
    let labels = branch_labels(tree);
    let rows = sim.rows();

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct TreeOutput<'a> {
                selection: Option<&'a str>,
                collapsed: Vec<String>,
                anomalies: Vec<String>,
                rows: Vec<RowView<'a>>,
            }
            print_json(
                "tree",
                TreeOutput {
                    selection: sim.selection(),
                    collapsed: sim.collapse().keys().map(ToString::to_string).collect(),
                    anomalies: sim.report().anomalies.iter().map(describe_anomaly).collect(),
                    rows: rows
                        .iter()
                        .map(|row| RowView::new(tree, row, &labels))
                        .collect(),
                },
            )
        }
        OutputFormat::Text => {
            if tree.is_empty() {
                println!("(no turns)");
                return Ok(());
            }
            for row in &rows {
                println!("{}", render_row(tree, row, &labels, sim.selection()));
            }
            for anomaly in &sim.report().anomalies {
                eprintln!("note: {}", describe_anomaly(anomaly));
            }
            Ok(())
        }
    }
}

/// Run the `path` command: the linear conversation up to the selection.
pub fn run_path(
    file: &Path,
    settings: CollapseSettings,
    select: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let sim = open_simulation(file, settings, select)?;
    let tree = sim.tree();
    let labels = branch_labels(tree);
    let path = sim.playback_path();

    match format {
        OutputFormat::Json => {
            let turns: Vec<TurnView<'_>> = path
                .iter()
                .map(|&idx| TurnView::new(&tree.node(idx).record, &labels))
                .collect();
            print_json("path", turns)
        }
        OutputFormat::Text => {
            for &idx in &path {
                println!("{}", render_turn(tree.node(idx), &labels));
            }
            Ok(())
        }
    }
}

/// Run the `branches` command.
pub fn run_branches(file: &Path, settings: CollapseSettings, format: OutputFormat) -> Result<()> {
    let sim = open_simulation(file, settings, None)?;
    let tree = sim.tree();
    let list = branches(tree);

    #[derive(Serialize)]
    struct BranchView<'a> {
        label: &'a str,
        head: &'a str,
        leaf: &'a str,
        len: usize,
        forked_from: Option<&'a str>,
    }

    let views: Vec<BranchView<'_>> = list
        .iter()
        .map(|branch| BranchView {
            label: &branch.label,
            head: tree.node(branch.head).node_id(),
            leaf: tree.node(branch.leaf).node_id(),
            len: branch.len,
            forked_from: branch.forked_from.map(|idx| tree.node(idx).node_id()),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json("branches", views),
        OutputFormat::Text => {
            for view in &views {
                let origin = view
                    .forked_from
                    .map(|id| format!(" (from {id})"))
                    .unwrap_or_default();
                println!(
                    "{:<6} {} .. {}  {} turns{origin}",
                    view.label, view.head, view.leaf, view.len
                );
            }
            Ok(())
        }
    }
}

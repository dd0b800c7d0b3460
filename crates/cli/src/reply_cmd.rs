use crate::config::LoadedConfig;
use crate::output::{OutputFormat, TurnView, print_json, render_turn};
use crate::records::open_simulation;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use turntree_composer::{Composer, ComposerSettings, ScriptedEngine};
use turntree_core::branches::branch_labels;
use turntree_core::jsonl::append_records;

#[derive(Debug, Clone)]
pub struct ReplyOptions {
    pub message: String,
    /// Continue from this turn instead of the default path.
    pub select: Option<String>,
    /// Human turn to answer differently; the reply becomes its sibling.
    pub anchor: Option<String>,
}

/// Run the `reply` command: submit one human message through the scripted
/// engine and append the resulting turns to `file`.
pub async fn run(
    file: &Path,
    loaded: &LoadedConfig,
    options: &ReplyOptions,
    format: OutputFormat,
) -> Result<()> {
    let mut sim = open_simulation(file, loaded.collapse_settings(), options.select.as_deref())?;

    let mut composer = Composer::new(ComposerSettings::from(&loaded.config.composer));
    if let Some(anchor) = &options.anchor {
        composer
            .set_anchor(&sim, anchor)
            .with_context(|| format!("cannot fork at {anchor}"))?;
    }
    composer.set_input(options.message.clone());

    let latest = sim.records().iter().map(|r| r.timestamp).max();
    let engine = ScriptedEngine::new(&loaded.config.engine).after(latest);
    let reply = composer
        .submit(&engine, &mut sim)
        .await
        .context("Failed to submit reply")?;

    let records = reply.records();
    append_records(file, &records)
        .with_context(|| format!("Failed to append to {}", file.display()))?;

    let tree = sim.tree();
    let labels = branch_labels(tree);
    let forked = options.anchor.is_some();

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ReplyOutput<'a> {
                fork: bool,
                turns: Vec<TurnView<'a>>,
            }
            print_json(
                "reply",
                ReplyOutput {
                    fork: forked,
                    turns: records
                        .iter()
                        .map(|record| TurnView::new(record, &labels))
                        .collect(),
                },
            )
        }
        OutputFormat::Text => {
            match &reply.human.parent_node_id {
                Some(parent) if forked => println!("forked below {parent}"),
                Some(parent) => println!("continued from {parent}"),
                None if forked => println!("forked a new root"),
                None => println!("started a new root"),
            }
            for record in &records {
                if let Some(node) = tree.get(&record.node_id) {
                    println!("  {}", render_turn(node, &labels));
                }
            }
            Ok(())
        }
    }
}

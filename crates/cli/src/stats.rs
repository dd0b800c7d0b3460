use crate::output::{OutputFormat, print_json};
use crate::records::{describe_anomaly, open_simulation};
use anyhow::{Context, Result, bail};
use std::path::Path;
use turntree_core::jsonl::load_records;
use turntree_core::stats::{TreeStats, tree_stats};
use turntree_core::validate::validate_records;
use turntree_core::{CollapseSettings, build_tree_with_report};

/// Run the `stats` command.
pub fn run_stats(file: &Path, settings: CollapseSettings, format: OutputFormat) -> Result<()> {
    let sim = open_simulation(file, settings, None)?;
    let stats = tree_stats(sim.tree());

    match format {
        OutputFormat::Json => print_json("stats", &stats),
        OutputFormat::Text => {
            print_text(&stats);
            Ok(())
        }
    }
}

fn print_text(stats: &TreeStats) {
    println!("Turn tree");
    println!("{}", "─".repeat(40));
    println!(
        "Turns: {} ({} human / {} agent)",
        stats.turn_count, stats.human_turns, stats.agent_turns
    );
    println!(
        "Roots: {} | Leaves: {} | Divergences: {}",
        stats.root_count, stats.leaf_count, stats.divergence_count
    );
    println!(
        "Max depth: {} | Longest straight run: {}",
        stats.max_depth, stats.longest_linear_run
    );
    if stats.drifted_turns > 0 || stats.invalid_turns > 0 {
        println!(
            "Status: {} valid, {} drifted, {} invalid ({:.0}% valid)",
            stats.valid_turns,
            stats.drifted_turns,
            stats.invalid_turns,
            percent(stats.valid_turns, stats.turn_count)
        );
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64) * 100.0
}

/// Run the `validate` command. Shape errors fail the command; structural
/// anomalies the tree builder can repair are only reported.
pub fn run_validate(file: &Path, format: OutputFormat) -> Result<()> {
    let records =
        load_records(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let errors: Vec<String> = match validate_records(&records) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    };
    let (_, report) = build_tree_with_report(&records);
    let anomalies: Vec<String> = report.anomalies.iter().map(describe_anomaly).collect();

    match format {
        OutputFormat::Json => print_json(
            "validate",
            serde_json::json!({
                "records": records.len(),
                "valid": errors.is_empty(),
                "errors": errors,
                "anomalies": anomalies,
            }),
        )?,
        OutputFormat::Text => {
            for error in &errors {
                println!("error: {error}");
            }
            for anomaly in &anomalies {
                println!("warning: {anomaly}");
            }
            if errors.is_empty() {
                println!("{} records OK", records.len());
            }
        }
    }

    if !errors.is_empty() {
        bail!("{} invalid record(s) in {}", errors.len(), file.display());
    }
    Ok(())
}

mod config;
mod config_cmd;
mod output;
mod records;
mod reply_cmd;
mod stats;
mod view_cmd;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use turntree_core::CollapseKey;

#[derive(Parser)]
#[command(
    name = "turntree",
    version,
    about = "Inspect and extend branching conversation records"
)]
struct Cli {
    /// Config file (default: $TURNTREE_CONFIG or ~/.config/turntree/turntree.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the conversation tree with collapsed branches and folded runs
    Tree {
        /// JSONL record file
        file: PathBuf,

        /// Turn to select; everything hiding it is opened
        #[arg(long)]
        select: Option<String>,

        /// Flip a collapse key, e.g. `diverge:n4` or `linear:n1` (repeatable)
        #[arg(long)]
        toggle: Vec<CollapseKey>,

        /// Open every branch and fold
        #[arg(long, conflicts_with = "collapse_all")]
        expand_all: bool,

        /// Collapse every divergence off the selected path
        #[arg(long)]
        collapse_all: bool,
    },

    /// Print the linear conversation leading to a turn
    Path {
        file: PathBuf,

        /// Target turn (default: the latest turn along the earliest branches)
        #[arg(long)]
        select: Option<String>,
    },

    /// List branches with their first and last turns
    Branches { file: PathBuf },

    /// Summarize the tree's shape and record status
    Stats { file: PathBuf },

    /// Check every record's shape and report structural problems
    Validate { file: PathBuf },

    /// Send a human message and append the new turns to the file
    Reply {
        file: PathBuf,

        /// Message text
        #[arg(short, long)]
        message: String,

        /// Continue from this turn
        #[arg(long)]
        select: Option<String>,

        /// Answer this human turn differently (creates a sibling branch)
        #[arg(long)]
        anchor: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if verbose {
        for directive in ["turntree=debug", "turntree_core=debug", "turntree_composer=debug"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loaded = config::load(cli.config.as_deref())?;
    let settings = loaded.collapse_settings();
    let format = cli.format;

    match cli.command {
        Commands::Tree {
            file,
            select,
            toggle,
            expand_all,
            collapse_all,
        } => {
            let options = view_cmd::TreeOptions {
                select,
                toggle,
                expand_all,
                collapse_all,
            };
            view_cmd::run_tree(&file, settings, &options, format)
        }
        Commands::Path { file, select } => {
            view_cmd::run_path(&file, settings, select.as_deref(), format)
        }
        Commands::Branches { file } => view_cmd::run_branches(&file, settings, format),
        Commands::Stats { file } => stats::run_stats(&file, settings, format),
        Commands::Validate { file } => stats::run_validate(&file, format),
        Commands::Reply {
            file,
            message,
            select,
            anchor,
        } => {
            let options = reply_cmd::ReplyOptions {
                message,
                select,
                anchor,
            };
            reply_cmd::run(&file, &loaded, &options, format).await
        }
        Commands::Config => config_cmd::run(&loaded, format),
    }
}

//! layoutseq CLI: inspect the configuration and artifacts of training runs.

mod commands;

use clap::Parser;
use std::path::PathBuf;

/// layoutseq: training orchestration for layout sequence models
#[derive(Parser, Debug)]
#[command(name = "layoutseq", version, about, long_about = None)]
struct Cli {
    /// Run directory holding an optional layoutseq.toml
    #[arg(short = 'd', long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Override the log root from the configuration
    #[arg(short, long, global = true)]
    log_root: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List checkpoints under the log root
    Checkpoints,
    /// Show the parameter summary of one checkpoint
    Inspect {
        /// Epoch the checkpoint was written at
        epoch: usize,
        /// Inspect the final checkpoint instead of the provisional best
        #[arg(long = "final")]
        final_checkpoint: bool,
    },
    /// Print per-epoch losses and learning rate from the scalar log
    Scalars {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Preview the train/eval partition sizes for a dataset
    Split {
        /// Number of samples in the dataset
        samples: usize,
        /// Seed for the shuffle (defaults to the configured seed)
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default layoutseq.toml into the run directory
    Init,
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    layoutseq_core::logging::init_stderr_logging(layoutseq_core::logging::filter_for_verbosity(
        cli.verbose,
        cli.quiet,
    ));

    let mut config = layoutseq_core::load_config(Some(&cli.dir), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(log_root) = cli.log_root {
        config.log_root = log_root;
    }
    tracing::debug!(
        dir = %cli.dir.display(),
        log_root = %config.log_root.display(),
        "Loaded configuration"
    );

    commands::handle_command(cli.command, &cli.dir, &config)
}

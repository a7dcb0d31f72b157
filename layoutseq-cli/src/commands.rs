//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use layoutseq_core::config::CONFIG_FILE_NAME;
use layoutseq_core::data::partition::random_split;
use layoutseq_core::hooks::ScalarEvent;
use layoutseq_core::{CheckpointManager, CheckpointTag, ScalarLog, TrainConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, dir: &Path, config: &TrainConfig) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, dir, config),
        Commands::Checkpoints => handle_checkpoints(config),
        Commands::Inspect {
            epoch,
            final_checkpoint,
        } => handle_inspect(config, epoch, final_checkpoint),
        Commands::Scalars { json } => handle_scalars(config, json),
        Commands::Split { samples, seed } => handle_split(config, samples, seed),
    }
}

fn handle_config(action: ConfigAction, dir: &Path, config: &TrainConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            std::fs::create_dir_all(dir)?;
            let toml_str = toml::to_string_pretty(&TrainConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn handle_checkpoints(config: &TrainConfig) -> anyhow::Result<()> {
    let manager = CheckpointManager::new(&config.log_root);
    let checkpoints = manager.list()?;
    if checkpoints.is_empty() {
        println!("No checkpoints in {}", config.log_root.display());
        return Ok(());
    }
    println!("{:>6}  {:<11}  {:>10}  sha256", "epoch", "tag", "bytes");
    for c in &checkpoints {
        let tag = match c.tag {
            CheckpointTag::Provisional => "provisional",
            CheckpointTag::Final => "final",
        };
        println!("{:>6}  {:<11}  {:>10}  {}", c.epoch, tag, c.size_bytes, c.hash);
    }
    Ok(())
}

fn handle_inspect(config: &TrainConfig, epoch: usize, final_tag: bool) -> anyhow::Result<()> {
    let tag = if final_tag {
        CheckpointTag::Final
    } else {
        CheckpointTag::Provisional
    };
    let manager = CheckpointManager::new(&config.log_root);
    let state = manager.load(epoch, tag)?;
    println!("{}", manager.path_for(epoch, tag).display());
    for (name, tensor) in &state.tensors {
        println!("  {name:<32} {:?} ({} values)", tensor.shape, tensor.numel());
    }
    println!("Total parameters: {}", state.num_parameters());
    Ok(())
}

/// One row of the per-epoch scalar table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct EpochRow {
    pub epoch: usize,
    pub train_loss: Option<f64>,
    pub eval_loss: Option<f64>,
    pub learning_rate: Option<f64>,
}

/// Pivot scalar events into one row per epoch. Later events win on duplicates.
pub(crate) fn epoch_rows(events: &[ScalarEvent]) -> Vec<EpochRow> {
    let mut rows: BTreeMap<usize, EpochRow> = BTreeMap::new();
    for event in events {
        let row = rows.entry(event.epoch).or_insert_with(|| EpochRow {
            epoch: event.epoch,
            ..EpochRow::default()
        });
        match event.tag.as_str() {
            "loss/train" => row.train_loss = Some(event.value),
            "loss/valid" => row.eval_loss = Some(event.value),
            "learning_rate" => row.learning_rate = Some(event.value),
            other => tracing::debug!(tag = other, "Ignoring unknown scalar tag"),
        }
    }
    rows.into_values().collect()
}

fn handle_scalars(config: &TrainConfig, json: bool) -> anyhow::Result<()> {
    let path = config.runs_dir().join(ScalarLog::FILE_NAME);
    if !path.exists() {
        println!("No scalar log at {}", path.display());
        return Ok(());
    }
    let rows = epoch_rows(&ScalarLog::read(&path)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.6}"));
    println!("{:>6}  {:>12}  {:>12}  {:>12}", "epoch", "train", "valid", "lr");
    for row in &rows {
        println!(
            "{:>6}  {:>12}  {:>12}  {:>12}",
            row.epoch,
            fmt(row.train_loss),
            fmt(row.eval_loss),
            fmt(row.learning_rate)
        );
    }
    Ok(())
}

fn handle_split(config: &TrainConfig, samples: usize, seed: Option<u64>) -> anyhow::Result<()> {
    let mut rng = match seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let partition = random_split(samples, config.train_ratio, &mut rng)?;
    println!(
        "Num of samples: {}, train samples: {}, eval samples: {}",
        partition.total(),
        partition.train.len(),
        partition.eval.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(tag: &str, value: f64, epoch: usize) -> ScalarEvent {
        ScalarEvent {
            run_id: Default::default(),
            tag: tag.into(),
            value,
            epoch,
            recorded_at: Default::default(),
        }
    }

    #[test]
    fn test_epoch_rows_pivot_by_epoch() {
        let events = vec![
            event("loss/train", 2.0, 1),
            event("loss/valid", 3.0, 1),
            event("learning_rate", 0.1, 1),
            event("loss/train", 1.5, 2),
        ];

        let rows = epoch_rows(&events);

        assert_eq!(
            rows,
            vec![
                EpochRow {
                    epoch: 1,
                    train_loss: Some(2.0),
                    eval_loss: Some(3.0),
                    learning_rate: Some(0.1),
                },
                EpochRow {
                    epoch: 2,
                    train_loss: Some(1.5),
                    ..EpochRow::default()
                },
            ]
        );
    }

    #[test]
    fn test_epoch_rows_ignore_unknown_tags() {
        let rows = epoch_rows(&[event("grad_norm", 9.0, 4)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].train_loss, None);
    }

    #[test]
    fn test_split_rejects_single_sample() {
        let config = TrainConfig {
            seed: Some(1),
            ..TrainConfig::default()
        };
        assert!(handle_split(&config, 1, None).is_err());
        assert!(handle_split(&config, 20, None).is_ok());
    }

    #[test]
    fn test_config_init_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        handle_config(ConfigAction::Init, dir.path(), &TrainConfig::default()).unwrap();

        let loaded = layoutseq_core::load_config(Some(dir.path()), None).unwrap();
        assert_eq!(loaded.batch_size, TrainConfig::default().batch_size);
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }
}

//! Training run configuration.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! run directory config file -> environment -> explicit overrides.

use crate::context::Device;
use crate::error::{TrainError, TrainResult};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the user config dir and in the run directory.
pub const CONFIG_FILE_NAME: &str = "layoutseq.toml";

/// Configuration for a single training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Total number of epochs (upper bound; early stopping may end sooner).
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,
    /// Samples per batch for both partitions.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Linear warmup length of the learning-rate schedule, in epochs.
    #[serde(default = "default_warmup")]
    pub n_warmup_epochs: usize,
    /// Peak learning rate handed to the optimizer.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Root directory for checkpoints, the run log and scalar logs.
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,
    /// Force CPU execution instead of the first accelerator.
    #[serde(default)]
    pub cpu: bool,
    /// Fraction of samples assigned to the train partition.
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    /// Consecutive non-improving epochs tolerated before stopping.
    #[serde(default = "default_patience")]
    pub patience: usize,
    /// Every `render_stride`-th evaluation batch is sent to the visualizer.
    #[serde(default = "default_render_stride")]
    pub render_stride: usize,
    /// Seed for the partition split and train shuffling. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_epochs: default_n_epochs(),
            batch_size: default_batch_size(),
            n_warmup_epochs: default_warmup(),
            learning_rate: default_learning_rate(),
            log_root: default_log_root(),
            cpu: false,
            train_ratio: default_train_ratio(),
            patience: default_patience(),
            render_stride: default_render_stride(),
            seed: None,
        }
    }
}

fn default_n_epochs() -> usize {
    100
}

fn default_batch_size() -> usize {
    16
}

fn default_warmup() -> usize {
    5
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_log_root() -> PathBuf {
    PathBuf::from("logs")
}

fn default_train_ratio() -> f64 {
    0.9
}

fn default_patience() -> usize {
    5
}

fn default_render_stride() -> usize {
    10
}

impl TrainConfig {
    /// Reject configurations the training loop cannot run with.
    pub fn validate(&self) -> TrainResult<()> {
        if self.n_epochs == 0 {
            return Err(TrainError::config("n_epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(TrainError::config("batch_size must be at least 1"));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(TrainError::config(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        if self.render_stride == 0 {
            return Err(TrainError::config("render_stride must be at least 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(TrainError::config(format!(
                "learning_rate must be a finite non-negative number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Execution device selected by the `cpu` flag.
    pub fn device(&self) -> Device {
        if self.cpu {
            Device::Cpu
        } else {
            Device::Accelerator(0)
        }
    }

    /// Path of the human-readable run log.
    pub fn log_file(&self) -> PathBuf {
        self.log_root.join(crate::logging::LOG_FILE_NAME)
    }

    /// Directory holding the scalar event log.
    pub fn runs_dir(&self) -> PathBuf {
        self.log_root.join("runs")
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `LAYOUTSEQ_`)
/// 3. Run directory config (`<dir>/layoutseq.toml`)
/// 4. User config (`~/.config/layoutseq/layoutseq.toml`)
/// 5. Built-in defaults
pub fn load_config(
    dir: Option<&Path>,
    overrides: Option<&TrainConfig>,
) -> Result<TrainConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(TrainConfig::default()));

    if let Some(project) = directories::ProjectDirs::from("dev", "layoutseq", "layoutseq") {
        let user_config = project.config_dir().join(CONFIG_FILE_NAME);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(dir) = dir {
        let run_config = dir.join(CONFIG_FILE_NAME);
        if run_config.exists() {
            figment = figment.merge(Toml::file(&run_config));
        }
    }

    // LAYOUTSEQ_BATCH_SIZE, LAYOUTSEQ_LOG_ROOT, ...
    figment = figment.merge(Env::prefixed("LAYOUTSEQ_"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

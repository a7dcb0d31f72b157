//! Error types for the layoutseq-core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the training core.
pub type TrainResult<T> = std::result::Result<T, TrainError>;

/// Top-level error type for training runs.
///
/// Every variant is fatal to the run that produced it. Best-effort
/// collaborators (metrics and visualization hooks, pruning of superseded
/// checkpoints) never surface through this type; their failures are logged.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("{partition} partition is empty ({total} samples, train ratio {ratio})")]
    EmptyPartition {
        partition: &'static str,
        total: usize,
        ratio: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Loss error: {0}")]
    Loss(String),

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("Checkpoint error at {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TrainError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn loss(msg: impl Into<String>) -> Self {
        Self::Loss(msg.into())
    }

    pub fn optimizer(msg: impl Into<String>) -> Self {
        Self::Optimizer(msg.into())
    }

    pub fn checkpoint(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Checkpoint {
            path: path.into(),
            source,
        }
    }
}

impl From<Box<figment::Error>> for TrainError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_partition_message() {
        let err = TrainError::EmptyPartition {
            partition: "eval",
            total: 5,
            ratio: 0.9,
        };
        assert_eq!(
            err.to_string(),
            "eval partition is empty (5 samples, train ratio 0.9)"
        );
    }

    #[test]
    fn test_checkpoint_error_carries_path() {
        let err = TrainError::checkpoint(
            "/tmp/model.epoch_3_p.ckpt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("model.epoch_3_p.ckpt"));
        assert!(msg.contains("denied"));
    }
}

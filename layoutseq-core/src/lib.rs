//! # layoutseq-core: training orchestration for layout sequence models
//!
//! Trains a model that predicts layout bounding-box sequences. The model,
//! loss, optimizer and dataset are supplied through the traits in [`model`]
//! and [`data`]; this crate owns the loop around them:
//!
//! 1. **Partitioning**: one random 90/10 train/eval split per run
//! 2. **Epochs**: a training pass then an evaluation pass, one batch at a time
//! 3. **Early stopping**: patience over the raw eval loss sum
//! 4. **Checkpoints**: a single rotating best snapshot plus a final one
//!
//! Metrics and prediction diagnostics go to best-effort [`hooks`].

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod schedule;
pub mod training;

pub use config::{TrainConfig, load_config};
pub use context::{Device, ExecutionContext};
pub use data::{BoundingBox, DataLoader, FrameworkMeta, LayoutBatch, LayoutDataset, Partition};
pub use error::{TrainError, TrainResult};
pub use hooks::{MetricsHook, NullHook, PredictionLog, ScalarLog, VisualizationHook};
pub use model::{
    Criterion, LayoutModel, Loss, LrScheduler, Mode, Optimizer, SequenceOutput, StateDict,
    TensorRecord,
};
pub use schedule::{ConstantScheduler, CosineWarmupScheduler};
pub use training::{
    Checkpoint, CheckpointManager, CheckpointTag, EarlyStopController, EpochRunner,
    TrainingOrchestrator, TrainingReport,
};

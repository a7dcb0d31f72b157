//! Training infrastructure: epoch passes, loss aggregation, early stopping,
//! checkpoint rotation and the orchestrating loop.

pub mod checkpoint;
pub mod early_stop;
pub mod epoch;
pub mod metrics;
pub mod orchestrator;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointTag};
pub use early_stop::{BestRecord, EarlyStopAction, EarlyStopController, EarlyStopState};
pub use epoch::EpochRunner;
pub use metrics::{EpochSummary, LossAccumulator, TrainingMetrics, epoch_mean};
pub use orchestrator::{TrainingOrchestrator, TrainingReport};

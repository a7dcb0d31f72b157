//! Loss aggregation and per-epoch history.

use serde::{Deserialize, Serialize};

/// Mean of per-batch losses over the batch count.
///
/// Returns `None` for zero batches.
pub fn epoch_mean(sum: f64, batches: usize) -> Option<f64> {
    (batches > 0).then(|| sum / batches as f64)
}

/// Running sum of per-batch losses within a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossAccumulator {
    sum: f64,
    batches: usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f64) {
        self.sum += loss;
        self.batches += 1;
    }

    /// Raw accumulated loss.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Per-batch mean; batch sizes are not weighted.
    pub fn mean(&self) -> Option<f64> {
        epoch_mean(self.sum, self.batches)
    }
}

impl FromIterator<f64> for LossAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        for loss in iter {
            acc.push(loss);
        }
        acc
    }
}

/// Scalars recorded for one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_loss: f64,
    pub eval_loss: f64,
    /// Raw eval loss sum, the quantity compared against the best record.
    pub eval_loss_sum: f64,
    pub eval_batches: usize,
    /// Learning rate in effect during this epoch.
    pub learning_rate: f64,
}

/// Per-epoch history of a training run.
///
/// Best-model tracking belongs to the early-stop controller; this only records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs: Vec<EpochSummary>,
}

impl TrainingMetrics {
    pub fn record_epoch(&mut self, summary: EpochSummary) {
        self.epochs.push(summary);
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs.len()
    }

    pub fn train_loss_history(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn eval_loss_history(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.eval_loss).collect()
    }

    pub fn last(&self) -> Option<&EpochSummary> {
        self.epochs.last()
    }
}

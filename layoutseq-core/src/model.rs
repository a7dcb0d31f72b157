//! Contracts for the collaborators the training loop drives: the model, the
//! loss function, the optimizer and the learning-rate scheduler.
//!
//! The loop never looks inside these. Gradients flow the way autodiff
//! backends hand them out: `Loss::backward` yields the model's gradient type,
//! which the optimizer consumes in `step`.

use crate::data::{BoundingBox, LayoutBatch};
use crate::error::TrainResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Train/eval flag forwarded to the model (dropout, normalization, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Train,
    Eval,
}

/// One named parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl TensorRecord {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    pub fn numel(&self) -> usize {
        self.values.len()
    }
}

/// Full parameter state, keyed by parameter path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, TensorRecord>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorRecord) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&TensorRecord> {
        self.tensors.get(name)
    }

    /// Total number of scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.tensors.values().map(TensorRecord::numel).sum()
    }
}

/// Raw model output that can be decoded into a token sequence.
pub trait SequenceOutput {
    /// Argmax token sequence predicted for sample `index` of the batch.
    fn predicted_sequence(&self, index: usize) -> Option<Vec<u32>>;
}

/// Trainable sequence model.
pub trait LayoutModel {
    type Output: SequenceOutput;
    type Gradients;

    fn set_mode(&mut self, mode: Mode);

    /// Enable or disable gradient tracking for subsequent forward passes.
    fn set_grad_enabled(&mut self, enabled: bool);

    fn forward(&mut self, batch: &LayoutBatch) -> TrainResult<Self::Output>;

    /// Snapshot of every parameter for serialization.
    fn state_dict(&self) -> StateDict;
}

/// Scope that disables gradient tracking and restores it on drop.
pub struct NoGrad<'a, M: LayoutModel> {
    model: &'a mut M,
}

impl<'a, M: LayoutModel> NoGrad<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        model.set_grad_enabled(false);
        Self { model }
    }
}

impl<M: LayoutModel> Deref for NoGrad<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: LayoutModel> DerefMut for NoGrad<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: LayoutModel> Drop for NoGrad<'_, M> {
    fn drop(&mut self) {
        self.model.set_grad_enabled(true);
    }
}

/// Differentiable scalar loss.
pub trait Loss {
    type Gradients;

    fn value(&self) -> f64;

    fn backward(self) -> TrainResult<Self::Gradients>;
}

/// Loss function over model output and batch targets.
pub trait Criterion<M: LayoutModel> {
    type Loss: Loss<Gradients = M::Gradients>;

    fn compute(
        &self,
        output: &M::Output,
        bbox_targets: &[Vec<BoundingBox>],
        token_counts: &[usize],
        sequence_mask: &[Vec<bool>],
    ) -> TrainResult<Self::Loss>;
}

/// Parameter update rule.
pub trait Optimizer<M: LayoutModel> {
    fn zero_grad(&mut self, model: &mut M);

    fn step(&mut self, model: &mut M, grads: M::Gradients) -> TrainResult<()>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

/// Epoch-granularity learning-rate schedule.
pub trait LrScheduler {
    /// Learning rate for the current position in the schedule.
    fn current_lr(&self) -> f64;

    /// Advance one epoch and return the new learning rate.
    fn step(&mut self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag {
        grad: bool,
    }

    struct NoOutput;

    impl SequenceOutput for NoOutput {
        fn predicted_sequence(&self, _index: usize) -> Option<Vec<u32>> {
            None
        }
    }

    impl LayoutModel for Flag {
        type Output = NoOutput;
        type Gradients = ();

        fn set_mode(&mut self, _mode: Mode) {}

        fn set_grad_enabled(&mut self, enabled: bool) {
            self.grad = enabled;
        }

        fn forward(&mut self, _batch: &LayoutBatch) -> TrainResult<NoOutput> {
            Ok(NoOutput)
        }

        fn state_dict(&self) -> StateDict {
            StateDict::new()
        }
    }

    #[test]
    fn test_no_grad_restores_tracking() {
        let mut model = Flag { grad: true };
        {
            let guard = NoGrad::new(&mut model);
            assert!(!guard.grad);
        }
        assert!(model.grad);
    }

    #[test]
    fn test_state_dict_counts_parameters() {
        let mut state = StateDict::new();
        state.insert("encoder.weight", TensorRecord::new(vec![2, 3], vec![0.0; 6]));
        state.insert("encoder.bias", TensorRecord::new(vec![3], vec![0.0; 3]));
        assert_eq!(state.num_parameters(), 9);
        assert_eq!(state.get("encoder.bias").map(|t| t.shape.clone()), Some(vec![3]));
    }
}

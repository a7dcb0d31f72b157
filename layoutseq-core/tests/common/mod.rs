//! Scripted collaborators for exercising the training loop end to end.

#![allow(dead_code)]

use layoutseq_core::data::{BoundingBox, FrameworkMeta, LayoutBatch, LayoutDataset};
use layoutseq_core::error::{TrainError, TrainResult};
use layoutseq_core::model::{
    Criterion, LayoutModel, Loss, Mode, Optimizer, SequenceOutput, StateDict, TensorRecord,
};
use layoutseq_core::{ExecutionContext, MetricsHook, TrainConfig, VisualizationHook};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// `n` synthetic layouts; sample `i` encodes to `[i, i + 1]`.
pub struct SyntheticLayouts {
    pub n: usize,
    pub with_frameworks: bool,
}

impl SyntheticLayouts {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            with_frameworks: true,
        }
    }
}

impl LayoutDataset for SyntheticLayouts {
    type Sample = u32;

    fn len(&self) -> usize {
        self.n
    }

    fn get(&self, index: usize) -> TrainResult<u32> {
        if index >= self.n {
            return Err(TrainError::dataset(format!("index {index} out of range")));
        }
        Ok(index as u32)
    }

    fn collate(&self, samples: Vec<u32>, _ctx: &ExecutionContext) -> TrainResult<LayoutBatch> {
        let frameworks = self.with_frameworks.then(|| {
            samples
                .iter()
                .map(|s| FrameworkMeta {
                    name: format!("layout_{s}"),
                    labels: vec!["header".into(), "card".into()],
                })
                .collect()
        });
        Ok(LayoutBatch {
            src: samples.iter().map(|&s| vec![s, s + 1]).collect(),
            target_sequence: samples.iter().map(|&s| vec![s]).collect(),
            bbox_targets: samples
                .iter()
                .map(|_| vec![BoundingBox::new(0.0, 1.0, 0.0, 1.0)])
                .collect(),
            token_counts: vec![1; samples.len()],
            sequence_mask: vec![vec![true]; samples.len()],
            frameworks,
        })
    }
}

/// Output of [`ScriptedModel`]: which pass produced it plus the batch echo.
pub struct ScriptedOutput {
    pub epoch: usize,
    pub mode: Mode,
    pub first_src: Vec<u32>,
}

impl SequenceOutput for ScriptedOutput {
    fn predicted_sequence(&self, index: usize) -> Option<Vec<u32>> {
        (index == 0).then(|| self.first_src.clone())
    }
}

/// Model whose epoch counter advances at each switch into training mode.
#[derive(Default)]
pub struct ScriptedModel {
    pub epoch: usize,
    pub mode: Option<Mode>,
    pub steps: usize,
    pub grad_enabled: bool,
    /// Fail the forward pass once this epoch is reached.
    pub fail_at_epoch: Option<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            grad_enabled: true,
            ..Self::default()
        }
    }
}

impl LayoutModel for ScriptedModel {
    type Output = ScriptedOutput;
    type Gradients = f32;

    fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Train {
            self.epoch += 1;
        }
        self.mode = Some(mode);
    }

    fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    fn forward(&mut self, batch: &LayoutBatch) -> TrainResult<ScriptedOutput> {
        if self.fail_at_epoch.is_some_and(|e| self.epoch >= e) {
            return Err(TrainError::model("forward pass diverged"));
        }
        let mode = self.mode.unwrap_or(Mode::Eval);
        if mode == Mode::Eval {
            assert!(!self.grad_enabled, "eval forward ran with gradients enabled");
        }
        Ok(ScriptedOutput {
            epoch: self.epoch,
            mode,
            first_src: batch.src.first().cloned().unwrap_or_default(),
        })
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "steps",
            TensorRecord::new(vec![1], vec![self.steps as f32]),
        );
        state.insert("epoch", TensorRecord::new(vec![1], vec![self.epoch as f32]));
        state
    }
}

pub struct ScalarLoss(pub f64);

impl Loss for ScalarLoss {
    type Gradients = f32;

    fn value(&self) -> f64 {
        self.0
    }

    fn backward(self) -> TrainResult<f32> {
        Ok(self.0 as f32)
    }
}

/// Per-batch eval loss follows `eval_script[epoch - 1]` (last entry repeats).
pub struct ScriptedCriterion {
    pub train_loss: f64,
    pub eval_script: Vec<f64>,
}

impl ScriptedCriterion {
    pub fn new(eval_script: &[f64]) -> Self {
        Self {
            train_loss: 1.0,
            eval_script: eval_script.to_vec(),
        }
    }
}

impl Criterion<ScriptedModel> for ScriptedCriterion {
    type Loss = ScalarLoss;

    fn compute(
        &self,
        output: &ScriptedOutput,
        bbox_targets: &[Vec<BoundingBox>],
        token_counts: &[usize],
        sequence_mask: &[Vec<bool>],
    ) -> TrainResult<ScalarLoss> {
        if bbox_targets.len() != token_counts.len() || token_counts.len() != sequence_mask.len() {
            return Err(TrainError::loss("ragged batch"));
        }
        match output.mode {
            Mode::Train => Ok(ScalarLoss(self.train_loss)),
            Mode::Eval => {
                let idx = output.epoch.saturating_sub(1).min(self.eval_script.len() - 1);
                Ok(ScalarLoss(self.eval_script[idx]))
            }
        }
    }
}

#[derive(Default)]
pub struct CountingOptimizer {
    pub lr: f64,
    pub zeroed: usize,
    pub steps: usize,
}

impl Optimizer<ScriptedModel> for CountingOptimizer {
    fn zero_grad(&mut self, _model: &mut ScriptedModel) {
        self.zeroed += 1;
    }

    fn step(&mut self, model: &mut ScriptedModel, _grads: f32) -> TrainResult<()> {
        assert!(model.grad_enabled, "optimizer stepped without gradients");
        model.steps += 1;
        self.steps += 1;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Visualizer that records every call.
#[derive(Clone, Default)]
pub struct RecordingVisualizer {
    pub calls: Rc<RefCell<Vec<(String, String, Vec<u32>)>>>,
}

impl VisualizationHook for RecordingVisualizer {
    fn render(
        &mut self,
        sample: &FrameworkMeta,
        predicted: &[u32],
        label: &str,
    ) -> anyhow::Result<()> {
        self.calls
            .borrow_mut()
            .push((label.to_string(), sample.name.clone(), predicted.to_vec()));
        Ok(())
    }
}

/// Metrics hook that records every scalar.
#[derive(Clone, Default)]
pub struct RecordingMetrics {
    pub scalars: Rc<RefCell<Vec<(String, f64, usize)>>>,
    pub closed: Rc<RefCell<bool>>,
}

impl MetricsHook for RecordingMetrics {
    fn add_scalar(&mut self, tag: &str, value: f64, epoch: usize) -> anyhow::Result<()> {
        self.scalars
            .borrow_mut()
            .push((tag.to_string(), value, epoch));
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        *self.closed.borrow_mut() = true;
        Ok(())
    }
}

/// Hook that fails on every call.
pub struct BrokenHook;

impl MetricsHook for BrokenHook {
    fn add_scalar(&mut self, tag: &str, _value: f64, _epoch: usize) -> anyhow::Result<()> {
        anyhow::bail!("metrics backend unavailable for {tag}")
    }

    fn close(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("metrics backend unavailable")
    }
}

impl VisualizationHook for BrokenHook {
    fn render(&mut self, _: &FrameworkMeta, _: &[u32], _: &str) -> anyhow::Result<()> {
        anyhow::bail!("renderer crashed")
    }
}

pub fn config(log_root: &Path, n_epochs: usize, batch_size: usize) -> TrainConfig {
    TrainConfig {
        n_epochs,
        batch_size,
        n_warmup_epochs: 0,
        learning_rate: 1e-3,
        log_root: log_root.to_path_buf(),
        cpu: true,
        seed: Some(17),
        ..TrainConfig::default()
    }
}

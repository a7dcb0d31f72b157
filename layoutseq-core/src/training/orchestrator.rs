//! Top-level training loop: partition once, then train/evaluate per epoch
//! with scheduler stepping, early stopping and checkpoint rotation.

use crate::config::TrainConfig;
use crate::context::ExecutionContext;
use crate::data::{DataLoader, LayoutBatch, LayoutDataset, random_split};
use crate::error::{TrainError, TrainResult};
use crate::hooks::{MetricsHook, NullHook, VisualizationHook};
use crate::model::{Criterion, LayoutModel, LrScheduler, Optimizer, SequenceOutput};
use crate::training::checkpoint::{Checkpoint, CheckpointManager};
use crate::training::early_stop::{BestRecord, EarlyStopAction, EarlyStopController};
use crate::training::epoch::EpochRunner;
use crate::training::metrics::{EpochSummary, LossAccumulator, TrainingMetrics};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::Span;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub train_samples: usize,
    pub eval_samples: usize,
    /// Last epoch that ran to completion.
    pub last_epoch: usize,
    /// Epoch at which early stopping fired, if it did.
    pub stopped_at: Option<usize>,
    pub best: Option<BestRecord>,
    pub best_checkpoint: Option<Checkpoint>,
    pub final_checkpoint: Checkpoint,
    pub metrics: TrainingMetrics,
}

impl TrainingReport {
    pub fn stopped_early(&self) -> bool {
        self.stopped_at.is_some()
    }
}

/// Drives a model through train/eval epochs and manages its checkpoints.
pub struct TrainingOrchestrator<M, C, O, S> {
    config: TrainConfig,
    ctx: ExecutionContext,
    model: M,
    criterion: C,
    optimizer: O,
    scheduler: S,
    metrics_hook: Box<dyn MetricsHook>,
    visualizer: Box<dyn VisualizationHook>,
    checkpoints: CheckpointManager,
    rng: StdRng,
}

impl<M, C, O, S> TrainingOrchestrator<M, C, O, S>
where
    M: LayoutModel,
    C: Criterion<M>,
    O: Optimizer<M>,
    S: LrScheduler,
{
    /// Validates `config` and applies the scheduler's initial learning rate.
    pub fn new(
        config: TrainConfig,
        ctx: ExecutionContext,
        model: M,
        criterion: C,
        mut optimizer: O,
        scheduler: S,
    ) -> TrainResult<Self> {
        config.validate()?;
        optimizer.set_learning_rate(scheduler.current_lr());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let checkpoints = CheckpointManager::new(&config.log_root);
        Ok(Self {
            config,
            ctx,
            model,
            criterion,
            optimizer,
            scheduler,
            metrics_hook: Box::new(NullHook),
            visualizer: Box::new(NullHook),
            checkpoints,
            rng,
        })
    }

    pub fn with_metrics_hook(mut self, hook: impl MetricsHook + 'static) -> Self {
        self.metrics_hook = Box::new(hook);
        self
    }

    pub fn with_visualizer(mut self, hook: impl VisualizationHook + 'static) -> Self {
        self.visualizer = Box::new(hook);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Run the full procedure over `dataset`.
    ///
    /// The metrics hook is closed whether or not the run succeeds.
    pub fn fit<D: LayoutDataset>(&mut self, dataset: &D) -> TrainResult<TrainingReport> {
        let outcome = self.run(dataset);
        if let Err(e) = self.metrics_hook.close() {
            tracing::warn!(parent: &self.ctx.span, error = %e, "Failed to close metrics hook");
        }
        outcome
    }

    fn run<D: LayoutDataset>(&mut self, dataset: &D) -> TrainResult<TrainingReport> {
        let span = self.ctx.span.clone();
        let total = dataset.len();
        let ratio = self.config.train_ratio;
        let n_epochs = self.config.n_epochs;

        let partition = random_split(total, ratio, &mut self.rng)?;
        let (train_samples, eval_samples) = (partition.train.len(), partition.eval.len());
        let train_loader = DataLoader::new(partition.train, self.config.batch_size, true);
        let eval_loader = DataLoader::new(partition.eval, self.config.batch_size, false);
        tracing::info!(
            parent: &span,
            samples = total,
            train_samples,
            eval_samples,
            "Num of samples: {total}, train samples: {train_samples}, eval samples: {eval_samples}"
        );
        tracing::info!(parent: &span, device = %self.ctx.device, "Device: {}", self.ctx.device);

        let runner = EpochRunner::new(span.clone(), self.config.render_stride);
        let mut early_stop = EarlyStopController::new(self.config.patience);
        let mut metrics = TrainingMetrics::default();
        let mut best_checkpoint: Option<Checkpoint> = None;
        let mut stopped_at = None;
        let mut last_epoch = 0;

        tracing::info!(parent: &span, "Start training.");
        for epoch in 1..=n_epochs {
            tracing::info!(parent: &span, epoch, n_epochs, "epoch_{epoch}/{n_epochs}:");
            let learning_rate = self.optimizer.learning_rate();

            let train = runner.train(
                &mut self.model,
                &self.criterion,
                &mut self.optimizer,
                train_loader.iter(dataset, &self.ctx, &mut self.rng),
            )?;

            let visualizer = &mut self.visualizer;
            let eval = runner.evaluate(
                &mut self.model,
                &self.criterion,
                eval_loader.iter(dataset, &self.ctx, &mut self.rng),
                |_, batch, output| {
                    report_prediction(&span, &mut **visualizer, epoch, n_epochs, batch, output)
                },
            )?;

            let train_loss = pass_mean(&train, "train", total, ratio)?;
            let eval_loss = pass_mean(&eval, "eval", total, ratio)?;
            tracing::info!(
                parent: &span,
                epoch,
                train_loss,
                eval_loss,
                "Train loss: {train_loss}, Eval loss: {eval_loss}"
            );
            self.emit_scalar("loss/train", train_loss, epoch);
            self.emit_scalar("loss/valid", eval_loss, epoch);
            self.emit_scalar("learning_rate", learning_rate, epoch);

            let next_lr = self.scheduler.step();
            self.optimizer.set_learning_rate(next_lr);

            metrics.record_epoch(EpochSummary {
                epoch,
                train_loss,
                eval_loss,
                eval_loss_sum: eval.sum(),
                eval_batches: eval.batches(),
                learning_rate,
            });
            last_epoch = epoch;

            // Best tracking compares the raw eval sum, not the logged mean.
            match early_stop.on_epoch_end(epoch, eval.sum()) {
                EarlyStopAction::Checkpoint { supersedes } => {
                    let checkpoint = self.checkpoints.save(&self.model.state_dict(), epoch)?;
                    tracing::info!(
                        parent: &span,
                        epoch,
                        eval_loss_sum = eval.sum(),
                        path = %checkpoint.path.display(),
                        "New best model saved"
                    );
                    if let Some(previous) = supersedes {
                        if let Err(e) = self.checkpoints.prune(previous) {
                            tracing::warn!(
                                parent: &span,
                                epoch = previous,
                                error = %e,
                                "Failed to prune superseded checkpoint"
                            );
                        }
                    }
                    best_checkpoint = Some(checkpoint);
                }
                EarlyStopAction::Continue => {
                    tracing::debug!(
                        parent: &span,
                        epoch,
                        stale_epochs = early_stop.counter(),
                        best = early_stop.best_metric(),
                        "No improvement"
                    );
                }
                EarlyStopAction::Stop => {
                    tracing::info!(
                        parent: &span,
                        epoch,
                        stale_epochs = early_stop.counter(),
                        "Early stopping"
                    );
                    stopped_at = Some(epoch);
                    break;
                }
            }
        }

        let final_checkpoint = self
            .checkpoints
            .save_final(&self.model.state_dict(), last_epoch)?;
        tracing::info!(
            parent: &span,
            epoch = last_epoch,
            path = %final_checkpoint.path.display(),
            "Final model saved"
        );

        Ok(TrainingReport {
            train_samples,
            eval_samples,
            last_epoch,
            stopped_at,
            best: early_stop.best(),
            best_checkpoint,
            final_checkpoint,
            metrics,
        })
    }

    fn emit_scalar(&mut self, tag: &str, value: f64, epoch: usize) {
        if let Err(e) = self.metrics_hook.add_scalar(tag, value, epoch) {
            tracing::warn!(parent: &self.ctx.span, tag, epoch, error = %e, "Metrics hook failed");
        }
    }
}

fn pass_mean(
    acc: &LossAccumulator,
    partition: &'static str,
    total: usize,
    ratio: f64,
) -> TrainResult<f64> {
    acc.mean().ok_or(TrainError::EmptyPartition {
        partition,
        total,
        ratio,
    })
}

/// Log the first sample of an evaluation batch and hand it to the visualizer.
fn report_prediction<O: SequenceOutput>(
    span: &Span,
    visualizer: &mut dyn VisualizationHook,
    epoch: usize,
    n_epochs: usize,
    batch: &LayoutBatch,
    output: &O,
) {
    let Some(predicted) = output.predicted_sequence(0) else {
        tracing::warn!(parent: span, epoch, "Model output has no decodable prediction");
        return;
    };

    tracing::info!(parent: span, "epoch_{epoch}/{n_epochs}:");
    if let Some(framework) = batch.first_framework() {
        tracing::info!(parent: span, "framework_name: {}", framework.name);
        tracing::info!(parent: span, "framework_labels: {:?}", framework.labels);
    }
    tracing::info!(parent: span, "src: {:?}", batch.src.first());
    tracing::info!(parent: span, "decoder_output_label: {:?}", batch.target_sequence.first());
    tracing::info!(parent: span, "decoder_output_pred: {predicted:?}");

    match batch.first_framework() {
        Some(framework) => {
            let label = format!("epoch_{epoch}_");
            if let Err(e) = visualizer.render(framework, &predicted, &label) {
                tracing::warn!(parent: span, epoch, error = %e, "Visualization hook failed");
            }
        }
        None => {
            tracing::debug!(parent: span, epoch, "Batch has no framework metadata; render skipped")
        }
    }
}

//! Single training and evaluation passes over a partition.

use crate::data::LayoutBatch;
use crate::error::TrainResult;
use crate::model::{Criterion, LayoutModel, Loss, Mode, NoGrad, Optimizer};
use crate::training::metrics::LossAccumulator;
use tracing::Span;

/// Runs one pass over a stream of batches and accumulates the batch losses.
#[derive(Debug, Clone)]
pub struct EpochRunner {
    span: Span,
    render_stride: usize,
}

impl EpochRunner {
    /// `render_stride` of zero is treated as one.
    pub fn new(span: Span, render_stride: usize) -> Self {
        Self {
            span,
            render_stride: render_stride.max(1),
        }
    }

    pub fn render_stride(&self) -> usize {
        self.render_stride
    }

    /// Training pass: zero grads, forward, loss, backward, optimizer step.
    ///
    /// The first failing batch aborts the pass.
    pub fn train<M, C, O, I>(
        &self,
        model: &mut M,
        criterion: &C,
        optimizer: &mut O,
        batches: I,
    ) -> TrainResult<LossAccumulator>
    where
        M: LayoutModel,
        C: Criterion<M>,
        O: Optimizer<M>,
        I: IntoIterator<Item = TrainResult<LayoutBatch>>,
    {
        model.set_mode(Mode::Train);
        let mut acc = LossAccumulator::new();
        for (step, batch) in batches.into_iter().enumerate() {
            let batch = batch?;
            optimizer.zero_grad(model);
            let output = model.forward(&batch)?;
            let loss = criterion.compute(
                &output,
                &batch.bbox_targets,
                &batch.token_counts,
                &batch.sequence_mask,
            )?;
            let value = loss.value();
            let grads = loss.backward()?;
            optimizer.step(model, grads)?;
            acc.push(value);
            tracing::trace!(parent: &self.span, step, loss = value, "train step");
        }
        Ok(acc)
    }

    /// Evaluation pass without gradient tracking or parameter updates.
    ///
    /// `on_render` is called for batch indices `0, stride, 2 * stride, ...`
    /// with the batch and its raw output.
    pub fn evaluate<M, C, I, F>(
        &self,
        model: &mut M,
        criterion: &C,
        batches: I,
        mut on_render: F,
    ) -> TrainResult<LossAccumulator>
    where
        M: LayoutModel,
        C: Criterion<M>,
        I: IntoIterator<Item = TrainResult<LayoutBatch>>,
        F: FnMut(usize, &LayoutBatch, &M::Output),
    {
        model.set_mode(Mode::Eval);
        let mut model = NoGrad::new(model);
        let mut acc = LossAccumulator::new();
        for (step, batch) in batches.into_iter().enumerate() {
            let batch = batch?;
            let output = model.forward(&batch)?;
            let loss = criterion.compute(
                &output,
                &batch.bbox_targets,
                &batch.token_counts,
                &batch.sequence_mask,
            )?;
            if step % self.render_stride == 0 {
                on_render(step, &batch, &output);
            }
            let value = loss.value();
            acc.push(value);
            tracing::trace!(parent: &self.span, step, loss = value, "eval step");
        }
        Ok(acc)
    }
}

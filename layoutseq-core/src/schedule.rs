//! Learning-rate schedules stepped once per epoch.

use crate::model::LrScheduler;
use std::f64::consts::PI;

/// Linear warmup followed by a half-cosine decay to zero.
///
/// The factor at step `s` is `s / warmup` during warmup, then
/// `0.5 * (1 + cos(pi * progress))` with `progress` running from 0 to 1 over
/// the remaining steps. Step 0 therefore has factor 0 whenever warmup > 0.
#[derive(Debug, Clone)]
pub struct CosineWarmupScheduler {
    base_lr: f64,
    warmup_steps: usize,
    total_steps: usize,
    step: usize,
}

impl CosineWarmupScheduler {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
            step: 0,
        }
    }

    /// Multiplier applied to the base learning rate at `step`.
    pub fn factor(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return step as f64 / self.warmup_steps.max(1) as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = (step - self.warmup_steps) as f64 / decay_steps as f64;
        (0.5 * (1.0 + (PI * progress).cos())).max(0.0)
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }
}

impl LrScheduler for CosineWarmupScheduler {
    fn current_lr(&self) -> f64 {
        self.base_lr * self.factor(self.step)
    }

    fn step(&mut self) -> f64 {
        self.step += 1;
        self.current_lr()
    }
}

/// Fixed learning rate.
#[derive(Debug, Clone, Copy)]
pub struct ConstantScheduler {
    lr: f64,
}

impl ConstantScheduler {
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl LrScheduler for ConstantScheduler {
    fn current_lr(&self) -> f64 {
        self.lr
    }

    fn step(&mut self) -> f64 {
        self.lr
    }
}

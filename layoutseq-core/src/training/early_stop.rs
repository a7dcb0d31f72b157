//! Early stopping on the evaluation loss.

use serde::{Deserialize, Serialize};

/// Patience used when none is configured.
pub const DEFAULT_PATIENCE: usize = 5;

/// Controller state after the latest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyStopState {
    Improving,
    Plateau,
    Stopped,
}

/// What the loop must do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStopAction {
    /// New best: persist it, then drop the superseded provisional checkpoint.
    Checkpoint { supersedes: Option<usize> },
    Continue,
    Stop,
}

/// Best-seen metric and the epoch that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub metric: f64,
    pub epoch: usize,
}

/// Lower-is-better early stopping.
///
/// A strictly smaller metric resets the counter. Anything else (including
/// NaN) increments it, and the controller stops once the counter exceeds
/// `patience`, i.e. on the `patience + 1`-th consecutive non-improving epoch.
/// `Stopped` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStopController {
    pub patience: usize,
    state: EarlyStopState,
    best: Option<BestRecord>,
    counter: usize,
}

impl Default for EarlyStopController {
    fn default() -> Self {
        Self::new(DEFAULT_PATIENCE)
    }
}

impl EarlyStopController {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            state: EarlyStopState::Improving,
            best: None,
            counter: 0,
        }
    }

    pub fn on_epoch_end(&mut self, epoch: usize, metric: f64) -> EarlyStopAction {
        if self.state == EarlyStopState::Stopped {
            return EarlyStopAction::Stop;
        }

        if metric < self.best_metric() {
            let supersedes = self.best.map(|b| b.epoch);
            self.best = Some(BestRecord { metric, epoch });
            self.counter = 0;
            self.state = EarlyStopState::Improving;
            return EarlyStopAction::Checkpoint { supersedes };
        }

        self.counter += 1;
        if self.counter > self.patience {
            self.state = EarlyStopState::Stopped;
            EarlyStopAction::Stop
        } else {
            self.state = EarlyStopState::Plateau;
            EarlyStopAction::Continue
        }
    }

    /// Best metric so far; `+inf` before the first observation.
    pub fn best_metric(&self) -> f64 {
        self.best.map_or(f64::INFINITY, |b| b.metric)
    }

    pub fn best(&self) -> Option<BestRecord> {
        self.best
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn state(&self) -> EarlyStopState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == EarlyStopState::Stopped
    }
}

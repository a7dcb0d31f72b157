//! Explicit execution context threaded through collation, model construction
//! and the training loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Span;

/// Where tensors live for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    /// Accelerator ordinal (`cuda:0`, ...).
    Accelerator(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Device plus the logging handle every component writes through.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub device: Device,
    pub span: Span,
}

impl ExecutionContext {
    pub fn new(device: Device, span: Span) -> Self {
        Self { device, span }
    }

    /// Context with a fresh `train` span for the given run label.
    pub fn for_run(device: Device, run: &str) -> Self {
        let span = tracing::info_span!("train", run = %run, device = %device);
        Self { device, span }
    }

    /// Context without an enclosing span; events are emitted as roots.
    pub fn detached(device: Device) -> Self {
        Self {
            device,
            span: Span::none(),
        }
    }
}

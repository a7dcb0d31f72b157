//! Batch schema handed from collation to the model and loss function.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in `x1, x2, y1, y2` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, x2: f32, y1: f32, y2: f32) -> Self {
        Self { x1, x2, y1, y2 }
    }
}

/// Per-sample metadata carried only for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkMeta {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// One collated batch. Every per-sample field has one entry per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBatch {
    /// Encoded input tokens.
    pub src: Vec<Vec<u32>>,
    /// Decoder target tokens (`trg_y`).
    pub target_sequence: Vec<Vec<u32>>,
    /// Ground-truth boxes per target position.
    pub bbox_targets: Vec<Vec<BoundingBox>>,
    /// Number of non-padding target tokens per sample.
    pub token_counts: Vec<usize>,
    /// `true` where the target position is real, `false` on padding.
    pub sequence_mask: Vec<Vec<bool>>,
    /// Optional diagnostic metadata, one entry per sample.
    #[serde(default)]
    pub frameworks: Option<Vec<FrameworkMeta>>,
}

impl LayoutBatch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Diagnostic metadata for the first sample, if present.
    pub fn first_framework(&self) -> Option<&FrameworkMeta> {
        self.frameworks.as_ref().and_then(|f| f.first())
    }
}

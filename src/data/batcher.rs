// ============================================================
// Layer 4 — Pair Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<PairedScan>
// into device tensors.
//
//   Input:  N pairs, each two flat D·H·W volumes + two targets
//   Output: x1, x2  [N, 1, D, H, W]
//           y1, y2  [N, 1]
//
// Voxels are already depth-major, so concatenating the samples
// and reshaping is all the work there is.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::scan::PairedScan;

// ─── PairBatch ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// First scans — shape: [batch, 1, D, H, W]
    pub x1: Tensor<B, 5>,

    /// Second scans — same shape as x1
    pub x2: Tensor<B, 5>,

    /// Supervised targets of x1 — shape: [batch, 1]
    pub y1: Tensor<B, 2>,

    /// Targets of x2 — shape: [batch, 1], carried for evaluation only
    pub y2: Tensor<B, 2>,
}

// ─── PairBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone, Debug, Default)]
pub struct PairBatcher;

impl PairBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, PairedScan, PairBatch<B>> for PairBatcher {
    fn batch(&self, items: Vec<PairedScan>, device: &B::Device) -> PairBatch<B> {
        let batch = items.len();
        let [d, h, w] = items
            .first()
            .map(|p| p.dims.as_array())
            .unwrap_or([0, 0, 0]);

        let x1: Vec<f32> = items.iter().flat_map(|p| p.x1.iter().copied()).collect();
        let x2: Vec<f32> = items.iter().flat_map(|p| p.x2.iter().copied()).collect();
        let y1: Vec<f32> = items.iter().map(|p| p.y1).collect();
        let y2: Vec<f32> = items.iter().map(|p| p.y2).collect();

        PairBatch {
            x1: Tensor::from_data(TensorData::new(x1, [batch, 1, d, h, w]), device),
            x2: Tensor::from_data(TensorData::new(x2, [batch, 1, d, h, w]), device),
            y1: Tensor::from_data(TensorData::new(y1, [batch, 1]), device),
            y2: Tensor::from_data(TensorData::new(y2, [batch, 1]), device),
        }
    }
}

// ============================================================
// Layer 5 — Twin Objective
// ============================================================
// Total loss = contrastive(features_x1, features_x2)
//            + MSE(prediction_x1, y1)
//
// Contrastive term, per sample i:
//   d_i  = sqrt(max(‖flatten(f1_i) − flatten(f2_i)‖², ε))
//   loss = mean_i max(margin − d_i, 0)
//
// The hinge is zero once a pair is at least `margin` apart and
// grows as the pair gets closer, i.e. it pushes pairs apart.
// There is no same/different pair label and only branch 1 is
// supervised; both choices are kept as-is (see DESIGN.md).
//
// ε only floors the squared distance, so d is symmetric and exact
// for any pair further apart than √ε, and the square root never
// sees zero when f1 == f2.

use burn::{
    nn::loss::{MseLoss, Reduction},
    prelude::*,
};

use crate::ml::twin::TwinOutput;

#[derive(Config, Debug)]
pub struct ContrastiveLossConfig {
    #[config(default = 1.0)]
    pub margin: f64,
    /// Floor on the squared distance before the square root.
    #[config(default = 1e-12)]
    pub eps:    f64,
}

impl ContrastiveLossConfig {
    pub fn init(&self) -> ContrastiveLoss {
        ContrastiveLoss { margin: self.margin, eps: self.eps }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContrastiveLoss {
    pub margin: f64,
    pub eps:    f64,
}

impl ContrastiveLoss {
    /// Per-sample Euclidean distance between two batches of any rank ≥ 2.
    pub fn distance<B: Backend, const D: usize>(&self, a: Tensor<B, D>, b: Tensor<B, D>) -> Tensor<B, 1> {
        let batch = a.dims()[0];
        let diff: Tensor<B, 2> = (a - b).flatten(1, D - 1);
        diff.powf_scalar(2.0)
            .sum_dim(1)
            .clamp_min(self.eps)
            .sqrt()
            .reshape([batch])
    }

    /// `mean(clamp(margin - distance, min = 0))`
    pub fn forward<B: Backend, const D: usize>(&self, a: Tensor<B, D>, b: Tensor<B, D>) -> Tensor<B, 1> {
        self.distance(a, b)
            .neg()
            .add_scalar(self.margin)
            .clamp_min(0.0)
            .mean()
    }
}

/// The three loss values of one step, still attached to the graph.
pub struct TwinLoss<B: Backend> {
    pub total:       Tensor<B, 1>,
    pub contrastive: Tensor<B, 1>,
    pub regression:  Tensor<B, 1>,
}

/// Contrastive + regression objective, built once and passed around.
#[derive(Debug, Clone)]
pub struct TwinObjective {
    pub contrastive: ContrastiveLoss,
    pub mse:         MseLoss,
}

impl TwinObjective {
    pub fn new(margin: f64) -> Self {
        Self {
            contrastive: ContrastiveLossConfig::new().with_margin(margin).init(),
            mse:         MseLoss::new(),
        }
    }

    pub fn forward<B: Backend>(&self, output: &TwinOutput<B>, y1: Tensor<B, 2>) -> TwinLoss<B> {
        let contrastive = self
            .contrastive
            .forward(output.features_x1.clone(), output.features_x2.clone());
        let regression = self
            .mse
            .forward(output.prediction_x1.clone(), y1, Reduction::Mean);

        TwinLoss {
            total: contrastive.clone() + regression.clone(),
            contrastive,
            regression,
        }
    }
}

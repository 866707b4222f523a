// ============================================================
// Layer 5 — Twin Training Step
// ============================================================
// One optimisation update of the shared backbone:
//
//   1. validate x1 / x2 / y1 shapes          (fails before any compute)
//   2. twin forward                          (one backbone, two inputs)
//   3. total = contrastive + MSE(pred_x1, y1)
//   4. backward                              (fresh gradients every step)
//   5. Adam step                             (model replaced only here)
//
// Because the model is swapped in only after the optimiser has
// returned, a step that errors out leaves the weights exactly
// as they were.

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::PairBatch;
use crate::ml::error::{check_pair, ShapeError};
use crate::ml::loss::TwinObjective;
use crate::ml::twin::TwinEncoder;

#[derive(Config, Debug)]
pub struct TwinStepConfig {
    /// Contrastive hinge margin.
    #[config(default = 1.0)]
    pub margin:        f64,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
}

/// Scalar losses reported by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub total:       f64,
    pub contrastive: f64,
    pub regression:  f64,
}

impl StepReport {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite() && self.contrastive.is_finite() && self.regression.is_finite()
    }
}

/// Owns the twin model and its optimiser; the only writer of the weights.
pub struct TwinTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<TwinEncoder<B>, B>,
{
    model:     TwinEncoder<B>,
    optim:     O,
    objective: TwinObjective,
    lr:        f64,
}

impl<B, O> TwinTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<TwinEncoder<B>, B>,
{
    pub fn new(model: TwinEncoder<B>, optim: O, cfg: &TwinStepConfig) -> Self {
        Self {
            model,
            optim,
            objective: TwinObjective::new(cfg.margin),
            lr:        cfg.learning_rate,
        }
    }

    /// Run one forward/backward/update and report the losses.
    pub fn step(
        &mut self,
        x1: Tensor<B, 5>,
        x2: Tensor<B, 5>,
        y1: Tensor<B, 2>,
    ) -> Result<StepReport, ShapeError> {
        check_pair(
            x1.dims(),
            x2.dims(),
            y1.dims(),
            self.model.in_channels(),
            self.model.num_classes(),
        )?;

        let output = self.model.forward(x1, x2);
        let loss   = self.objective.forward(&output, y1);

        let report = StepReport {
            total:       loss.total.clone().into_scalar().elem::<f64>(),
            contrastive: loss.contrastive.into_scalar().elem::<f64>(),
            regression:  loss.regression.into_scalar().elem::<f64>(),
        };

        let grads = loss.total.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);

        Ok(report)
    }

    /// `step` on a batched pair; `y2` is carried but not supervised.
    pub fn step_batch(&mut self, batch: PairBatch<B>) -> Result<StepReport, ShapeError> {
        self.step(batch.x1, batch.x2, batch.y1)
    }

    pub fn model(&self) -> &TwinEncoder<B> {
        &self.model
    }

    /// Inference copy on the inner backend (running BN stats, no dropout).
    pub fn valid_model(&self) -> TwinEncoder<B::InnerBackend> {
        self.model.valid()
    }

    pub fn objective(&self) -> &TwinObjective {
        &self.objective
    }

    pub fn into_model(self) -> TwinEncoder<B> {
        self.model
    }
}

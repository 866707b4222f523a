// ============================================================
// Layer 5 — Residual Blocks (3D)
// ============================================================
// The two building blocks of the backbone:
//
//   BasicBlock  (expansion 1)
//     conv3³(s) → BN → ReLU → drop → conv3³ → BN → +skip → ReLU
//
//   Bottleneck  (expansion 4)
//     conv1³ → BN → ReLU → drop → conv3³(s) → BN → ReLU → drop
//     → conv1³(×4) → BN → +skip → ReLU
//
// The skip path is the identity unless the stride or the
// channel count changes, in which case a 1³ conv + BN projects
// the input onto the output shape.

use burn::{
    nn::{conv::Conv3d, BatchNorm, BatchNormConfig, Relu},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::ml::layers::{conv3d, SpatialDropout};

/// Which residual block a network is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Basic,
    Bottleneck,
}

impl BlockKind {
    /// Output channels per unit of `planes`.
    pub fn expansion(self) -> usize {
        match self {
            BlockKind::Basic      => 1,
            BlockKind::Bottleneck => 4,
        }
    }
}

// ─── Block Config ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    pub kind:      BlockKind,
    pub in_planes: usize,
    pub planes:    usize,
    #[config(default = 1)]
    pub stride:    usize,
    #[config(default = 0.0)]
    pub dropout:   f64,
}

impl ResidualBlockConfig {
    pub fn out_planes(&self) -> usize {
        self.planes * self.kind.expansion()
    }

    /// Both conditions are checked; either one forces a projection.
    pub fn needs_projection(&self) -> bool {
        self.stride != 1 || self.in_planes != self.out_planes()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualBlock<B> {
        match self.kind {
            BlockKind::Basic      => ResidualBlock::Basic(self.init_basic(device)),
            BlockKind::Bottleneck => ResidualBlock::Bottleneck(self.init_bottleneck(device)),
        }
    }

    fn init_basic<B: Backend>(&self, device: &B::Device) -> BasicBlock<B> {
        let planes = self.planes;
        BasicBlock {
            conv1:      conv3d([self.in_planes, planes], 3, self.stride, 1, device),
            bn1:        BatchNormConfig::new(planes).init(device),
            conv2:      conv3d([planes, planes], 3, 1, 1, device),
            bn2:        BatchNormConfig::new(planes).init(device),
            downsample: self.init_projection(device),
            dropout:    SpatialDropout::new(self.dropout),
            relu:       Relu::new(),
        }
    }

    fn init_bottleneck<B: Backend>(&self, device: &B::Device) -> Bottleneck<B> {
        let planes = self.planes;
        let out    = self.out_planes();
        Bottleneck {
            conv1:      conv3d([self.in_planes, planes], 1, 1, 0, device),
            bn1:        BatchNormConfig::new(planes).init(device),
            conv2:      conv3d([planes, planes], 3, self.stride, 1, device),
            bn2:        BatchNormConfig::new(planes).init(device),
            conv3:      conv3d([planes, out], 1, 1, 0, device),
            bn3:        BatchNormConfig::new(out).init(device),
            downsample: self.init_projection(device),
            dropout:    SpatialDropout::new(self.dropout),
            relu:       Relu::new(),
        }
    }

    fn init_projection<B: Backend>(&self, device: &B::Device) -> Option<Downsample<B>> {
        if !self.needs_projection() {
            return None;
        }
        let out = self.out_planes();
        Some(Downsample {
            conv: conv3d([self.in_planes, out], 1, self.stride, 0, device),
            bn:   BatchNormConfig::new(out).init(device),
        })
    }
}

// ─── Shortcut Projection ──────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv3d<B>,
    pub bn:   BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        self.bn.forward(self.conv.forward(x))
    }
}

// ─── BasicBlock ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1:      Conv3d<B>,
    pub bn1:        BatchNorm<B>,
    pub conv2:      Conv3d<B>,
    pub bn2:        BatchNorm<B>,
    pub downsample: Option<Downsample<B>>,
    pub dropout:    SpatialDropout,
    pub relu:       Relu,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let residual = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.dropout.forward(out);
        let out = self.bn2.forward(self.conv2.forward(out));

        self.relu.forward(out + residual)
    }
}

// ─── Bottleneck ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1:      Conv3d<B>,
    pub bn1:        BatchNorm<B>,
    pub conv2:      Conv3d<B>,
    pub bn2:        BatchNorm<B>,
    pub conv3:      Conv3d<B>,
    pub bn3:        BatchNorm<B>,
    pub downsample: Option<Downsample<B>>,
    pub dropout:    SpatialDropout,
    pub relu:       Relu,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let residual = match &self.downsample {
            Some(ds) => ds.forward(x.clone()),
            None     => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.dropout.forward(out);
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.dropout.forward(out);
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + residual)
    }
}

// ─── ResidualBlock ────────────────────────────────────────────────────────────
/// A block of either variant, so one stage can be a plain `Vec`.
#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    Basic(BasicBlock<B>),
    Bottleneck(Bottleneck<B>),
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        match self {
            ResidualBlock::Basic(block)      => block.forward(x),
            ResidualBlock::Bottleneck(block) => block.forward(x),
        }
    }

    pub fn has_projection(&self) -> bool {
        match self {
            ResidualBlock::Basic(block)      => block.downsample.is_some(),
            ResidualBlock::Bottleneck(block) => block.downsample.is_some(),
        }
    }
}

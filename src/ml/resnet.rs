// ============================================================
// Layer 5 — 3D ResNet Backbone
// ============================================================
// Volumetric ResNet used as the shared encoder of both branches.
//
//   input  [B, in_channels, D, H, W]
//     │
//     ▼
//   stem   conv7³ /2 → BN → ReLU → maxpool3³ /2      (÷4)
//     │
//     ▼
//   layer1 planes 64       stride 1
//   layer2 planes 128      stride 2                 (÷8)
//   layer3 planes 256      stride 2                 (÷16)
//   layer4 planes 512      stride 2                 (÷32)
//     │                                  ← forward_features()
//     ▼
//   head   global avg pool → Linear(512·exp → num_classes)
//                                        ← forward()
//
// `forward` is literally `head(forward_features(x))`, so the
// feature view and the regression output can never diverge.
//
// Reference: He et al. (2016) Deep Residual Learning
//            Hara et al. (2018) 3D CNNs for spatio-temporal data

use burn::{
    nn::{conv::Conv3d, BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu},
    prelude::*,
};

use crate::ml::blocks::{BlockKind, ResidualBlock, ResidualBlockConfig};
use crate::ml::error::{check_volume, ShapeError};
use crate::ml::layers::{conv3d, global_avg_pool, MaxPool3d};

/// Width multipliers of the four stages relative to `base_planes`.
const STAGE_WIDTHS:  [usize; 4] = [1, 2, 4, 8];
const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

#[derive(Config, Debug)]
pub struct ResNet3dConfig {
    pub block:       BlockKind,
    /// Number of blocks in each of the four stages.
    pub layers:      [usize; 4],
    #[config(default = 1)]
    pub in_channels: usize,
    #[config(default = 1)]
    pub num_classes: usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
    /// Stem width; stages use 1×, 2×, 4× and 8× of it.
    #[config(default = 64)]
    pub base_planes: usize,
}

impl ResNet3dConfig {
    pub fn resnet10()  -> Self { Self::new(BlockKind::Basic,      [1, 1, 1, 1]) }
    pub fn resnet18()  -> Self { Self::new(BlockKind::Basic,      [2, 2, 2, 2]) }
    pub fn resnet34()  -> Self { Self::new(BlockKind::Basic,      [3, 4, 6, 3]) }
    pub fn resnet50()  -> Self { Self::new(BlockKind::Bottleneck, [3, 4, 6, 3]) }
    /// The canonical network: bottleneck blocks, depths [3, 4, 23, 3].
    pub fn resnet101() -> Self { Self::new(BlockKind::Bottleneck, [3, 4, 23, 3]) }
    pub fn resnet152() -> Self { Self::new(BlockKind::Bottleneck, [3, 8, 36, 3]) }
    pub fn resnet200() -> Self { Self::new(BlockKind::Bottleneck, [3, 24, 36, 3]) }

    /// Look up a named configuration by its layer count.
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            10  => Some(Self::resnet10()),
            18  => Some(Self::resnet18()),
            34  => Some(Self::resnet34()),
            50  => Some(Self::resnet50()),
            101 => Some(Self::resnet101()),
            152 => Some(Self::resnet152()),
            200 => Some(Self::resnet200()),
            _   => None,
        }
    }

    /// Channel count of the `forward_features` output.
    pub fn feature_channels(&self) -> usize {
        self.base_planes * STAGE_WIDTHS[3] * self.block.expansion()
    }

    /// Shape of the pre-head feature map for a given input volume.
    pub fn feature_shape(&self, batch: usize, spatial: [usize; 3]) -> [usize; 5] {
        // stem conv and maxpool each halve (rounding up), stages 2–4 halve again
        let reduce = |s: usize| {
            let mut s = s;
            for _ in 0..5 {
                s = s.div_ceil(2);
            }
            s
        };
        [
            batch,
            self.feature_channels(),
            reduce(spatial[0]),
            reduce(spatial[1]),
            reduce(spatial[2]),
        ]
    }

    /// Reject inputs the network cannot process.
    pub fn validate_input(&self, dims: [usize; 5]) -> Result<(), ShapeError> {
        check_volume(dims, self.in_channels)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet3d<B> {
        let stem_planes = self.base_planes;
        let conv1 = conv3d([self.in_channels, stem_planes], 7, 2, 3, device);
        let bn1   = BatchNormConfig::new(stem_planes).init(device);

        // `in_planes` is threaded through the four stage constructions
        let mut in_planes = stem_planes;
        let mut stages: Vec<Vec<ResidualBlock<B>>> = Vec::with_capacity(4);
        for i in 0..4 {
            let planes = self.base_planes * STAGE_WIDTHS[i];
            let stage  = self.make_layer(&mut in_planes, planes, self.layers[i], STAGE_STRIDES[i], device);
            stages.push(stage);
        }
        let layer4 = stages.pop().unwrap_or_default();
        let layer3 = stages.pop().unwrap_or_default();
        let layer2 = stages.pop().unwrap_or_default();
        let layer1 = stages.pop().unwrap_or_default();

        let fc = LinearConfig::new(in_planes, self.num_classes).init(device);

        ResNet3d {
            conv1,
            bn1,
            relu: Relu::new(),
            maxpool: MaxPool3d::new(3, 2, 1),
            layer1,
            layer2,
            layer3,
            layer4,
            fc,
            in_channels: self.in_channels,
            num_classes: self.num_classes,
        }
    }

    /// Build one stage. Only the first block may change stride or width;
    /// afterwards `in_planes` holds `planes * expansion`.
    fn make_layer<B: Backend>(
        &self,
        in_planes: &mut usize,
        planes:    usize,
        blocks:    usize,
        stride:    usize,
        device:    &B::Device,
    ) -> Vec<ResidualBlock<B>> {
        let mut layer = Vec::with_capacity(blocks);
        for i in 0..blocks {
            let block_stride = if i == 0 { stride } else { 1 };
            let cfg = ResidualBlockConfig::new(self.block, *in_planes, planes)
                .with_stride(block_stride)
                .with_dropout(self.dropout);
            layer.push(cfg.init(device));
            *in_planes = cfg.out_planes();
        }
        layer
    }
}

#[derive(Module, Debug)]
pub struct ResNet3d<B: Backend> {
    pub conv1:   Conv3d<B>,
    pub bn1:     BatchNorm<B>,
    pub relu:    Relu,
    pub maxpool: MaxPool3d,
    pub layer1:  Vec<ResidualBlock<B>>,
    pub layer2:  Vec<ResidualBlock<B>>,
    pub layer3:  Vec<ResidualBlock<B>>,
    pub layer4:  Vec<ResidualBlock<B>>,
    pub fc:      Linear<B>,
    pub in_channels: usize,
    pub num_classes: usize,
}

impl<B: Backend> ResNet3d<B> {
    /// Stem + four stages: [B, C, D, H, W] → [B, 512·exp, D/32, H/32, W/32]
    pub fn forward_features(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let x = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let mut x = self.maxpool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }
        x
    }

    /// Pool + linear regression head, no output activation.
    pub fn head(&self, features: Tensor<B, 5>) -> Tensor<B, 2> {
        self.fc.forward(global_avg_pool(features))
    }

    /// [B, C, D, H, W] → [B, num_classes]
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        self.head(self.forward_features(x))
    }

    pub fn depth(&self) -> usize {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
            .iter()
            .map(|stage| stage.len())
            .sum()
    }
}

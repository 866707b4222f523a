// ============================================================
// Layer 5 — Twin Encoder
// ============================================================
// One backbone, two inputs. The encoder owns a single ResNet3d
// and calls it once per branch, so every parameter update is
// shared by both branches automatically: there is nothing to
// tie or synchronise.
//
//   x1 ──► forward_features ──► features_x1 ──► head ──► prediction_x1
//   x2 ──► forward_features ──► features_x2 ──► head ──► prediction_x2
//           (same weights)                      (same weights)
//
// The branches run one after the other rather than as one
// concatenated batch, so batch-norm statistics of one branch
// never mix with the other.

use burn::prelude::*;

use crate::ml::resnet::{ResNet3d, ResNet3dConfig};

#[derive(Config, Debug)]
pub struct TwinEncoderConfig {
    pub backbone: ResNet3dConfig,
}

impl TwinEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TwinEncoder<B> {
        TwinEncoder { backbone: self.backbone.init(device) }
    }
}

#[derive(Module, Debug)]
pub struct TwinEncoder<B: Backend> {
    pub backbone: ResNet3d<B>,
}

/// Everything one paired forward pass produces.
#[derive(Debug, Clone)]
pub struct TwinOutput<B: Backend> {
    /// [B, 512·exp, D/32, H/32, W/32]
    pub features_x1:   Tensor<B, 5>,
    pub features_x2:   Tensor<B, 5>,
    /// [B, num_classes]
    pub prediction_x1: Tensor<B, 2>,
    pub prediction_x2: Tensor<B, 2>,
}

impl<B: Backend> TwinEncoder<B> {
    /// Run both branches through the shared backbone.
    pub fn forward(&self, x1: Tensor<B, 5>, x2: Tensor<B, 5>) -> TwinOutput<B> {
        let features_x1 = self.backbone.forward_features(x1);
        let features_x2 = self.backbone.forward_features(x2);

        let prediction_x1 = self.backbone.head(features_x1.clone());
        let prediction_x2 = self.backbone.head(features_x2.clone());

        TwinOutput { features_x1, features_x2, prediction_x1, prediction_x2 }
    }

    pub fn in_channels(&self) -> usize {
        self.backbone.in_channels
    }

    pub fn num_classes(&self) -> usize {
        self.backbone.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::blocks::BlockKind;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    fn tiny_twin() -> TwinEncoder<TestBackend> {
        let backbone = ResNet3dConfig::new(BlockKind::Basic, [1, 1, 1, 1]).with_base_planes(4);
        TwinEncoderConfig::new(backbone).init(&Default::default())
    }

    fn volume(dims: [usize; 5]) -> Tensor<TestBackend, 5> {
        Tensor::random(dims, Distribution::Default, &Default::default())
    }

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn returns_features_and_predictions_for_both_branches() {
        let twin = tiny_twin();
        let out  = twin.forward(volume([2, 1, 32, 32, 64]), volume([2, 1, 32, 32, 64]));

        assert_eq!(out.features_x1.dims(), [2, 32, 1, 1, 2]);
        assert_eq!(out.features_x2.dims(), [2, 32, 1, 1, 2]);
        assert_eq!(out.prediction_x1.dims(), [2, 1]);
        assert_eq!(out.prediction_x2.dims(), [2, 1]);
    }

    #[test]
    fn identical_inputs_give_identical_branches() {
        let twin = tiny_twin();
        let x    = volume([2, 1, 32, 32, 32]);
        let out  = twin.forward(x.clone(), x);

        assert_eq!(to_vec(out.features_x1), to_vec(out.features_x2));
        assert_eq!(to_vec(out.prediction_x1), to_vec(out.prediction_x2));
    }

    #[test]
    fn branches_match_the_plain_backbone() {
        let twin = tiny_twin();
        let (x1, x2) = (volume([1, 1, 32, 32, 32]), volume([1, 1, 32, 32, 32]));
        let out = twin.forward(x1.clone(), x2.clone());

        assert_eq!(to_vec(out.features_x1), to_vec(twin.backbone.forward_features(x1.clone())));
        assert_eq!(to_vec(out.prediction_x1), to_vec(twin.backbone.forward(x1)));
        assert_eq!(to_vec(out.prediction_x2), to_vec(twin.backbone.forward(x2)));
    }
}

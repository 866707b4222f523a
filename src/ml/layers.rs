// ============================================================
// Layer 5 — Volumetric Layer Helpers
// ============================================================
// Burn ships Conv3d and a rank-generic BatchNorm, but pooling
// and dropout only come in 1D/2D, element-wise flavours. This
// file fills the gaps the 3D backbone needs:
//
//   MaxPool3d       → separable max pool (H×W plane, then depth)
//   global_avg_pool → [B, C, D, H, W] → [B, C]
//   SpatialDropout  → zeroes whole channels while training
//   conv3d          → Conv3d with the backbone's init scheme

use burn::{
    nn::{
        conv::{Conv3d, Conv3dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, PaddingConfig2d, PaddingConfig3d,
    },
    prelude::*,
    tensor::Distribution,
};

/// Kaiming normal in fan-out mode with the ReLU gain (√2).
pub fn kaiming_fan_out() -> Initializer {
    Initializer::KaimingNormal {
        gain:         std::f64::consts::SQRT_2,
        fan_out_only: true,
    }
}

/// Bias-free cubic convolution, Kaiming fan-out initialised.
pub fn conv3d<B: Backend>(
    channels: [usize; 2],
    kernel:   usize,
    stride:   usize,
    padding:  usize,
    device:   &B::Device,
) -> Conv3d<B> {
    Conv3dConfig::new(channels, [kernel; 3])
        .with_stride([stride; 3])
        .with_padding(PaddingConfig3d::Explicit(padding, padding, padding))
        .with_bias(false)
        .with_initializer(kaiming_fan_out())
        .init(device)
}

// ─── MaxPool3d ────────────────────────────────────────────────────────────────
/// Cubic max pooling built from two 2D pools.
///
/// Max is separable, so pooling the H×W plane of every depth slice
/// and then pooling along depth gives the same result as a single
/// k×k×k window.
#[derive(Module, Clone, Debug)]
pub struct MaxPool3d {
    plane: MaxPool2d,
    depth: MaxPool2d,
}

impl MaxPool3d {
    pub fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        let plane = MaxPool2dConfig::new([kernel, kernel])
            .with_strides([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .init();
        let depth = MaxPool2dConfig::new([kernel, 1])
            .with_strides([stride, 1])
            .with_padding(PaddingConfig2d::Explicit(padding, 0))
            .init();
        Self { plane, depth }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let [batch, channels, depth, height, width] = x.dims();

        // [B, C·D, H, W] → pool each slice in-plane
        let x = self.plane.forward(x.reshape([batch, channels * depth, height, width]));
        let [_, _, out_h, out_w] = x.dims();

        // [B, C, D, H'·W'] → pool along depth only
        let x = self.depth.forward(x.reshape([batch, channels, depth, out_h * out_w]));
        let [_, _, out_d, _] = x.dims();

        x.reshape([batch, channels, out_d, out_h, out_w])
    }
}

/// Adaptive average pool to (1, 1, 1) followed by flatten.
pub fn global_avg_pool<B: Backend>(x: Tensor<B, 5>) -> Tensor<B, 2> {
    let [batch, channels, depth, height, width] = x.dims();
    x.reshape([batch, channels, depth * height * width])
        .mean_dim(2)
        .reshape([batch, channels])
}

// ─── SpatialDropout ───────────────────────────────────────────────────────────
/// Channel-wise dropout for volumes (one Bernoulli draw per
/// sample and channel, broadcast over D×H×W).
///
/// Like Burn's own `Dropout`, it is the identity unless the
/// backend is tracking gradients, so `model.valid()` and plain
/// inference backends are never affected.
#[derive(Module, Clone, Debug)]
pub struct SpatialDropout {
    pub prob: f64,
}

impl SpatialDropout {
    pub fn new(prob: f64) -> Self {
        Self { prob }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        if !B::ad_enabled() || self.prob <= 0.0 {
            return x;
        }
        let dims = x.dims();
        let [batch, channels, _, _, _] = dims;
        let keep = 1.0 - self.prob;
        let mask = Tensor::<B, 5>::random(
            [batch, channels, 1, 1, 1],
            Distribution::Bernoulli(keep),
            &x.device(),
        );
        x * mask.div_scalar(keep).expand(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    #[test]
    fn max_pool_halves_every_axis() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 5>::random([2, 3, 16, 8, 12], Distribution::Default, &device);
        let y = MaxPool3d::new(3, 2, 1).forward(x);
        assert_eq!(y.dims(), [2, 3, 8, 4, 6]);
    }

    #[test]
    fn max_pool_picks_cube_maximum() {
        let device = Default::default();
        // 2×2×2 volume, kernel 2 stride 2 → single output = max of all eight
        let values = vec![0.1f32, 0.5, 0.3, 0.2, 0.9, 0.4, 0.0, 0.7];
        let x = Tensor::<TestBackend, 5>::from_data(TensorData::new(values, [1, 1, 2, 2, 2]), &device);
        let y = MaxPool3d::new(2, 2, 0).forward(x);
        assert_eq!(y.dims(), [1, 1, 1, 1, 1]);
        let out: Vec<f32> = y.into_data().to_vec::<f32>().unwrap();
        assert!((out[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn global_pool_averages_each_channel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 5>::ones([2, 4, 2, 3, 2], &device).mul_scalar(3.0);
        let y = global_avg_pool(x);
        assert_eq!(y.dims(), [2, 4]);
        let out: Vec<f32> = y.into_data().to_vec::<f32>().unwrap();
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn dropout_is_identity_without_autodiff() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 5>::random([2, 4, 2, 2, 2], Distribution::Default, &device);
        let y = SpatialDropout::new(0.5).forward(x.clone());
        let before: Vec<f32> = x.into_data().to_vec::<f32>().unwrap();
        let after:  Vec<f32> = y.into_data().to_vec::<f32>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn dropout_drops_whole_channels_while_training() {
        let device = Default::default();
        let x = Tensor::<Autodiff<NdArray>, 5>::ones([4, 8, 2, 2, 2], &device);
        let y = SpatialDropout::new(0.5).forward(x);
        let out: Vec<f32> = y.into_data().to_vec::<f32>().unwrap();

        // every channel block of 8 voxels is uniformly dropped (0) or rescaled (2)
        for channel in out.chunks(8) {
            let first = channel[0];
            assert!(first == 0.0 || (first - 2.0).abs() < 1e-6);
            assert!(channel.iter().all(|&v| v == first));
        }
    }
}

// ============================================================
// Layer 2 — SummaryUseCase
// ============================================================
// Builds a backbone on the CPU and reports what a training run
// would be working with: parameter count, per-stage block counts
// and the feature-map shape for a given volume size. No weights
// are loaded and nothing is trained.

use anyhow::{bail, Result};
use burn::{backend::NdArray, module::Module};

use crate::ml::error::DOWNSAMPLE_FACTOR;
use crate::ml::resnet::ResNet3dConfig;

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub depth:       usize,
    pub base_planes: usize,
    pub volume_size: usize,
    pub batch_size:  usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub depth:         usize,
    pub layers:        [usize; 4],
    pub num_params:    usize,
    pub input_shape:   [usize; 5],
    pub feature_shape: [usize; 5],
    pub output_shape:  [usize; 2],
    /// Blocks whose shortcut is a strided 1³ conv + BN.
    pub projections:   usize,
}

pub struct SummaryUseCase {
    config: SummaryConfig,
}

impl SummaryUseCase {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<NetworkSummary> {
        let cfg = &self.config;
        let Some(model_cfg) = ResNet3dConfig::from_depth(cfg.depth) else {
            bail!("Unsupported ResNet depth {}", cfg.depth);
        };
        let model_cfg = model_cfg.with_base_planes(cfg.base_planes);

        let input_shape = [cfg.batch_size, model_cfg.in_channels, cfg.volume_size, cfg.volume_size, cfg.volume_size];
        model_cfg.validate_input(input_shape)?;
        if cfg.volume_size % DOWNSAMPLE_FACTOR != 0 {
            tracing::warn!(
                "volume_size {} is not a multiple of {}; feature maps will be rounded up",
                cfg.volume_size, DOWNSAMPLE_FACTOR,
            );
        }

        let model = model_cfg.init::<NdArray>(&Default::default());
        let projections = [&model.layer1, &model.layer2, &model.layer3, &model.layer4]
            .iter()
            .flat_map(|stage| stage.iter())
            .filter(|block| block.has_projection())
            .count();

        Ok(NetworkSummary {
            depth:         cfg.depth,
            layers:        model_cfg.layers,
            num_params:    model.num_params(),
            input_shape,
            feature_shape: model_cfg.feature_shape(cfg.batch_size, [cfg.volume_size; 3]),
            output_shape:  [cfg.batch_size, model_cfg.num_classes],
            projections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resnet18_summary_at_reduced_width() {
        let summary = SummaryUseCase::new(SummaryConfig {
            depth:       18,
            base_planes: 4,
            volume_size: 64,
            batch_size:  2,
        })
        .execute()
        .unwrap();

        assert_eq!(summary.layers, [2, 2, 2, 2]);
        assert_eq!(summary.feature_shape, [2, 32, 2, 2, 2]);
        assert_eq!(summary.output_shape, [2, 1]);
        assert!(summary.num_params > 0);
        // basic blocks: stage 1 keeps width and stride, stages 2-4 project
        assert_eq!(summary.projections, 3);
    }

    #[test]
    fn every_bottleneck_stage_opens_with_a_projection() {
        let summary = SummaryUseCase::new(SummaryConfig {
            depth:       50,
            base_planes: 2,
            volume_size: 32,
            batch_size:  1,
        })
        .execute()
        .unwrap();
        assert_eq!(summary.projections, 4);
        assert_eq!(summary.feature_shape, [1, 64, 1, 1, 1]);
    }

    #[test]
    fn rejects_volume_below_downsampling_factor() {
        let result = SummaryUseCase::new(SummaryConfig {
            depth:       10,
            base_planes: 4,
            volume_size: 16,
            batch_size:  1,
        })
        .execute();
        assert!(result.is_err());
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Resolve the network config    (Layer 5 - ml)
//   Step 2: Generate and check pairs      (Layer 4 - data)
//   Step 3: Split train/validation        (Layer 4 - data)
//   Step 4: Build datasets                (Layer 4 - data)
//   Step 5: Save config, open metrics     (Layer 6 - infra)
//   Step 6: Run training loop             (Layer 5 - ml)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::PairDataset,
    splitter::split_train_val,
    synthetic::SyntheticPairSource,
};
use crate::domain::{
    scan::{PairedScan, VolumeDims},
    traits::PairSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::error::DOWNSAMPLE_FACTOR;
use crate::ml::resnet::ResNet3dConfig;
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints so the exact network can be rebuilt later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub checkpoint_dir: String,
    /// ResNet depth: 10, 18, 34, 50, 101, 152 or 200
    pub depth:          usize,
    pub base_planes:    usize,
    pub dropout:        f64,
    pub margin:         f64,
    pub lr:             f64,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub num_pairs:      usize,
    /// Edge length of the cubic input volumes
    pub volume_size:    usize,
    pub train_fraction: f64,
    pub seed:           u64,
    /// Continue from the latest checkpoint in `checkpoint_dir`
    #[serde(default)]
    pub resume:         bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "checkpoints".to_string(),
            depth:          101,
            base_planes:    64,
            dropout:        0.0,
            margin:         1.0,
            lr:             1e-3,
            batch_size:     8,
            epochs:         10,
            num_pairs:      64,
            volume_size:    64,
            train_fraction: 0.8,
            seed:           42,
            resume:         false,
        }
    }
}

impl TrainConfig {
    /// Backbone config for this run: single channel in, scalar out.
    pub fn model_config(&self) -> Result<ResNet3dConfig> {
        let Some(cfg) = ResNet3dConfig::from_depth(self.depth) else {
            bail!("Unsupported ResNet depth {} (expected 10, 18, 34, 50, 101, 152 or 200)", self.depth);
        };
        Ok(cfg
            .with_in_channels(1)
            .with_num_classes(1)
            .with_dropout(self.dropout)
            .with_base_planes(self.base_planes))
    }

    /// Reject settings the pipeline cannot run with, before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.volume_size < DOWNSAMPLE_FACTOR || self.volume_size % DOWNSAMPLE_FACTOR != 0 {
            bail!(
                "volume_size must be a positive multiple of {DOWNSAMPLE_FACTOR}, got {}",
                self.volume_size
            );
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.base_planes == 0 {
            bail!("base_planes must be at least 1");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            bail!("train_fraction must be in [0, 1], got {}", self.train_fraction);
        }
        self.model_config().map(|_| ())
    }

    /// A resumed run must rebuild the exact network it is restoring.
    pub fn ensure_same_network(&self, saved: &TrainConfig) -> Result<()> {
        let ours   = (self.depth, self.base_planes, self.volume_size);
        let theirs = (saved.depth, saved.base_planes, saved.volume_size);
        if ours != theirs {
            bail!(
                "Cannot resume: checkpoint was trained with depth={}, base_planes={}, volume_size={} \
                 but this run asks for depth={}, base_planes={}, volume_size={}",
                theirs.0, theirs.1, theirs.2, ours.0, ours.1, ours.2,
            );
        }
        Ok(())
    }
}

/// Every pair must hold two volumes of exactly `dims`; the batcher
/// stacks them without further checks.
pub fn ensure_pairs_match(pairs: &[PairedScan], dims: VolumeDims) -> Result<()> {
    for (i, pair) in pairs.iter().enumerate() {
        if pair.dims != dims {
            bail!(
                "Pair {i} has volume size {:?}, expected {:?}",
                pair.dims.as_array(),
                dims.as_array()
            );
        }
        if !pair.is_consistent() {
            bail!(
                "Pair {i} holds {} and {} voxels, expected {} for {:?}",
                pair.x1.len(),
                pair.x2.len(),
                dims.voxels(),
                dims.as_array()
            );
        }
    }
    Ok(())
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Resolve the network ───────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Generate paired scans ─────────────────────────────────────
        let dims   = VolumeDims::cube(cfg.volume_size);
        let source = SyntheticPairSource::new(cfg.num_pairs, dims, cfg.seed);
        let pairs  = source.load_pairs()?;
        ensure_pairs_match(&pairs, dims)?;
        tracing::info!("Generated {} paired scans of {}³ voxels", pairs.len(), cfg.volume_size);

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_pairs, val_pairs) = split_train_val(pairs, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            val_pairs.len()
        );
        if train_pairs.is_empty() {
            bail!("No training pairs left after the split; raise --num-pairs or --train-fraction");
        }

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = PairDataset::new(train_pairs);
        let val_dataset   = PairDataset::new(val_pairs);

        // ── Step 5: Save config, open metrics log ─────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        if cfg.resume {
            cfg.ensure_same_network(&ckpt_manager.load_config()?)?;
        }
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train_dataset, val_dataset, &ckpt_manager, &metrics)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::blocks::BlockKind;

    #[test]
    fn default_config_builds_the_101_layer_network() {
        let cfg = TrainConfig::default();
        assert!(cfg.validate().is_ok());

        let model = cfg.model_config().unwrap();
        assert_eq!(model.block, BlockKind::Bottleneck);
        assert_eq!(model.layers, [3, 4, 23, 3]);
        assert_eq!(model.num_classes, 1);
        assert_eq!(model.in_channels, 1);
        assert_eq!(cfg.margin, 1.0);
        assert_eq!(cfg.lr, 1e-3);
    }

    #[test]
    fn rejects_unknown_depth() {
        let cfg = TrainConfig { depth: 42, ..TrainConfig::default() };
        assert!(cfg.model_config().is_err());
    }

    #[test]
    fn rejects_volumes_that_collapse() {
        let cfg = TrainConfig { volume_size: 48, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = TrainConfig { volume_size: 16, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pairs_with_wrong_voxel_count_fail_fast() {
        let dims = VolumeDims::cube(2);
        let good = PairedScan::new(dims, vec![0.0; 8], vec![0.0; 8], 0.1, 0.2);
        let bad  = PairedScan::new(dims, vec![0.0; 8], vec![0.0; 7], 0.1, 0.2);

        assert!(ensure_pairs_match(&[good.clone()], dims).is_ok());
        let err = ensure_pairs_match(&[good, bad], dims).unwrap_err();
        assert!(err.to_string().contains("Pair 1"));
    }

    #[test]
    fn pairs_of_another_size_fail_fast() {
        let small = PairedScan::new(VolumeDims::cube(2), vec![0.0; 8], vec![0.0; 8], 0.1, 0.2);
        let other = PairedScan::new(VolumeDims::new(2, 2, 1), vec![0.0; 4], vec![0.0; 4], 0.1, 0.2);

        let err = ensure_pairs_match(&[small, other], VolumeDims::cube(2)).unwrap_err();
        assert!(err.to_string().contains("volume size"));
    }

    #[test]
    fn resume_requires_the_same_network() {
        let saved = TrainConfig::default();
        let same  = TrainConfig { epochs: 20, lr: 1e-4, resume: true, ..TrainConfig::default() };
        let wider = TrainConfig { base_planes: 32, resume: true, ..TrainConfig::default() };

        assert!(same.ensure_same_network(&saved).is_ok());
        assert!(wider.ensure_same_network(&saved).is_err());
    }

    #[test]
    fn execute_resume_rejects_a_different_saved_network() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        CheckpointManager::new(dir.clone())
            .save_config(&TrainConfig { depth: 18, ..TrainConfig::default() })
            .unwrap();

        let cfg = TrainConfig {
            checkpoint_dir: dir,
            depth:          10,
            base_planes:    2,
            num_pairs:      2,
            volume_size:    32,
            resume:         true,
            ..TrainConfig::default()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("Cannot resume"));
    }
}

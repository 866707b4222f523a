// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the twin encoder's weights. The encoder holds
// a single backbone, so one record covers every conv, norm and
// linear parameter (plus BN running statistics) as one snapshot.
//
// File layout:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← number of the latest epoch
//     train_config.json      ← hyperparameters of the run
//
// Weights go through Burn's MessagePack + gzip file recorder at
// full precision, so a restored model reproduces the saved one
// exactly.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::twin::TwinEncoder;

/// MessagePack + gzip, f32 parameters.
pub type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Cannot create checkpoint dir '{}': {e}", dir.display());
        }
        Self { dir }
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(
        &self,
        model: &TwinEncoder<B>,
        epoch: usize,
    ) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CheckpointRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`.
    ///
    /// `model` must have the architecture the checkpoint was saved
    /// from; build it from `load_config()` first.
    pub fn load_model<B: Backend>(
        &self,
        model:  TwinEncoder<B>,
        device: &B::Device,
    ) -> Result<TwinEncoder<B>> {
        let epoch = self.latest_epoch()?;
        self.load_epoch(model, epoch, device)
    }

    pub fn load_epoch<B: Backend>(
        &self,
        model:  TwinEncoder<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<TwinEncoder<B>> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CheckpointRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' first.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }

    /// Read latest_epoch.json and return the epoch number.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                "Cannot find 'latest_epoch.json'. \
                 Have you run 'train' first?"
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{blocks::BlockKind, resnet::ResNet3dConfig, twin::TwinEncoderConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> TwinEncoderConfig {
        TwinEncoderConfig::new(
            ResNet3dConfig::new(BlockKind::Bottleneck, [1, 1, 1, 1]).with_base_planes(2),
        )
    }

    fn flat_weights(model: &TwinEncoder<TestBackend>) -> Vec<f32> {
        let mut all: Vec<f32> = model.backbone.conv1.weight.val().into_data().to_vec::<f32>().unwrap();
        all.extend(model.backbone.fc.weight.val().into_data().to_vec::<f32>().unwrap());
        all
    }

    #[test]
    fn saved_weights_restore_into_fresh_model() {
        let tmp    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(tmp.path().to_string_lossy().to_string());

        let saved: TwinEncoder<TestBackend> = tiny_config().init(&device);
        ckpt.save_model(&saved, 3).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 3);

        let fresh: TwinEncoder<TestBackend> = tiny_config().init(&device);
        assert_ne!(flat_weights(&saved), flat_weights(&fresh));

        let restored = ckpt.load_model(fresh, &device).unwrap();
        assert_eq!(flat_weights(&saved), flat_weights(&restored));
    }

    #[test]
    fn config_survives_a_save_load_cycle() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path().to_string_lossy().to_string());

        let cfg = TrainConfig { depth: 18, margin: 2.5, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();

        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.depth, 18);
        assert_eq!(loaded.margin, 2.5);
    }

    #[test]
    fn loading_before_training_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path().to_string_lossy().to_string());
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
    }
}

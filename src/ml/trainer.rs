// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop around the twin step:
//
//   - TwinTrainer (Autodiff<Wgpu>) owns model + Adam
//   - the train loader reshuffles every epoch from `cfg.seed`
//   - validation runs on model.valid() → inner Wgpu backend,
//     BN on running statistics, dropout off
//   - metrics row + checkpoint after each epoch
//   - with `resume`, weights come from the latest checkpoint and
//     the loop continues at the following epoch (Adam restarts)
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::Module,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{PairBatch, PairBatcher},
    dataset::PairDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::loss::TwinObjective;
use crate::ml::step::{StepReport, TwinStepConfig, TwinTrainer};
use crate::ml::twin::{TwinEncoder, TwinEncoderConfig};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub type PairLoader<B> = Arc<dyn DataLoader<B, PairBatch<B>>>;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: PairDataset,
    val_dataset:   PairDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, train_dataset, val_dataset, ckpt_manager, metrics, &device)?;
    Ok(())
}

/// Batches `dataset` onto `device`; `shuffle` reseeds the order every epoch.
pub fn pair_loader<B: Backend>(
    dataset:    PairDataset,
    batch_size: usize,
    shuffle:    Option<u64>,
    device:     &B::Device,
) -> PairLoader<B> {
    let builder = DataLoaderBuilder::new(PairBatcher::new())
        .batch_size(batch_size.max(1))
        .num_workers(1)
        .set_device(device.clone());
    match shuffle {
        Some(seed) => builder.shuffle(seed).build(dataset),
        None       => builder.build(dataset),
    }
}

/// Backend-generic loop; returns the trained model.
pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: PairDataset,
    val_dataset:   PairDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<TwinEncoder<B>> {

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = TwinEncoderConfig::new(cfg.model_config()?);
    let mut model: TwinEncoder<B> = model_cfg.init(device);
    let mut first_epoch = 1;
    if cfg.resume {
        first_epoch = ckpt_manager.latest_epoch()? + 1;
        model = ckpt_manager.load_model(model, device)?;
        tracing::info!("Resuming after epoch {}", first_epoch - 1);
    }
    tracing::info!(
        "Model ready: ResNet3d-{} ({:?}), {} parameters",
        cfg.depth,
        model_cfg.backbone.block,
        model.num_params(),
    );

    // ── Adam optimiser, fixed learning rate ───────────────────────────────────
    let step_cfg = TwinStepConfig::new()
        .with_margin(cfg.margin)
        .with_learning_rate(cfg.lr);
    let optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut trainer = TwinTrainer::new(model, optim, &step_cfg);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader: PairLoader<B> =
        pair_loader(train_dataset, cfg.batch_size, Some(cfg.seed), device);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_loader: PairLoader<B::InnerBackend> =
        pair_loader(val_dataset, cfg.batch_size, None, device);

    let mut best = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in first_epoch..=cfg.epochs {
        let mut sum = LossSums::default();
        for batch in train_loader.iter() {
            let report = trainer.step_batch(batch)?;

            if !report.is_finite() {
                tracing::warn!("Non-finite loss in epoch {}: {:?}", epoch, report);
            }
            sum.add(&report);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = trainer.valid_model();
        let eval = evaluate(&model_valid, trainer.objective(), &val_loader);

        let row = EpochMetrics {
            epoch,
            train_loss:        sum.mean(sum.total),
            train_contrastive: sum.mean(sum.contrastive),
            train_regression:  sum.mean(sum.regression),
            val_mse:           eval.mse,
            val_mae:           eval.mae,
            val_contrastive:   eval.contrastive,
        };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} (contrastive={:.4}, mse={:.4}) | val_mse={:.4} | val_mae={:.4} | val_contrastive={:.4}",
            epoch, cfg.epochs, row.train_loss, row.train_contrastive, row.train_regression,
            row.val_mse, row.val_mae, row.val_contrastive,
        );

        tracing::debug!("Epoch {} unsupervised branch: val_mae_x2={:.4}", epoch, eval.mae_x2);

        if row.is_improvement(best) {
            best = row.val_mse;
            tracing::info!("New best val_mse={:.4} at epoch {}", best, epoch);
        }

        metrics.log(&row)?;
        ckpt_manager.save_model(trainer.model(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete! Metrics in '{}'", metrics.csv_path().display());
    Ok(trainer.into_model())
}

#[derive(Debug, Default)]
struct LossSums {
    total:       f64,
    contrastive: f64,
    regression:  f64,
    batches:     usize,
}

impl LossSums {
    fn add(&mut self, report: &StepReport) {
        self.total       += report.total;
        self.contrastive += report.contrastive;
        self.regression  += report.regression;
        self.batches     += 1;
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.batches > 0 { sum / self.batches as f64 } else { f64::NAN }
    }
}

/// Branch-1 validation metrics plus the contrastive term, averaged per sample.
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub mse:         f64,
    pub mae:         f64,
    /// MAE of the unsupervised branch against `y2`, for diagnostics only.
    pub mae_x2:      f64,
    pub contrastive: f64,
}

/// Score `model` on every batch of `loader` without touching any weights.
pub fn evaluate<B: Backend>(
    model:     &TwinEncoder<B>,
    objective: &TwinObjective,
    loader:    &PairLoader<B>,
) -> Evaluation {
    let mut sq_err      = 0.0f64;
    let mut abs_err     = 0.0f64;
    let mut abs_err_x2  = 0.0f64;
    let mut contrastive = 0.0f64;
    let mut samples     = 0usize;

    for batch in loader.iter() {
        let n = batch.y1.dims()[0];

        let out  = model.forward(batch.x1, batch.x2);
        let diff = out.prediction_x1 - batch.y1;
        abs_err_x2 += (out.prediction_x2 - batch.y2).abs().sum().into_scalar().elem::<f64>();

        sq_err  += diff.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        abs_err += diff.abs().sum().into_scalar().elem::<f64>();
        contrastive += objective
            .contrastive
            .forward(out.features_x1, out.features_x2)
            .into_scalar()
            .elem::<f64>()
            * n as f64;
        samples += n;
    }

    if samples == 0 {
        return Evaluation { mse: f64::NAN, mae: f64::NAN, mae_x2: f64::NAN, contrastive: f64::NAN };
    }
    let n = samples as f64;
    Evaluation {
        mse:         sq_err / n,
        mae:         abs_err / n,
        mae_x2:      abs_err_x2 / n,
        contrastive: contrastive / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticPairSource;
    use crate::domain::scan::VolumeDims;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_run(dir: &str) -> TrainConfig {
        TrainConfig {
            checkpoint_dir: dir.to_string(),
            depth:          10,
            base_planes:    2,
            batch_size:     3,
            epochs:         2,
            num_pairs:      8,
            volume_size:    32,
            ..TrainConfig::default()
        }
    }

    fn datasets() -> (PairDataset, PairDataset) {
        let pairs = SyntheticPairSource::new(8, VolumeDims::cube(32), 1).generate();
        let (train, val) = pairs.split_at(6);
        (PairDataset::new(train.to_vec()), PairDataset::new(val.to_vec()))
    }

    fn tiny_model(device: &<NdArray as Backend>::Device) -> TwinEncoder<NdArray> {
        let cfg = TrainConfig { depth: 10, base_planes: 2, ..TrainConfig::default() };
        TwinEncoderConfig::new(cfg.model_config().unwrap()).init(device)
    }

    #[test]
    fn two_epochs_write_metrics_and_checkpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let cfg = tiny_run(&dir);
        let (train, val) = datasets();

        let ckpt    = CheckpointManager::new(dir.clone());
        let metrics = MetricsLogger::new(dir).unwrap();
        let device  = Default::default();

        let model = train_loop::<TestBackend>(&cfg, train, val, &ckpt, &metrics, &device).unwrap();
        assert_eq!(model.backbone.depth(), 4);
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().next().unwrap().ends_with(",val_contrastive"));
    }

    #[test]
    fn resume_continues_after_the_latest_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let ckpt    = CheckpointManager::new(dir.clone());
        let metrics = MetricsLogger::new(dir.clone()).unwrap();
        let device  = Default::default();

        let first = TrainConfig { epochs: 1, ..tiny_run(&dir) };
        let (train, val) = datasets();
        train_loop::<TestBackend>(&first, train, val, &ckpt, &metrics, &device).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);

        let resumed = TrainConfig { epochs: 3, resume: true, ..tiny_run(&dir) };
        let (train, val) = datasets();
        train_loop::<TestBackend>(&resumed, train, val, &ckpt, &metrics, &device).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 3);

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        let epochs: Vec<&str> = csv
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next())
            .collect();
        assert_eq!(epochs, vec!["1", "2", "3"]);
    }

    #[test]
    fn resume_without_checkpoint_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let cfg = TrainConfig { resume: true, ..tiny_run(&dir) };
        let (train, val) = datasets();

        let ckpt    = CheckpointManager::new(dir.clone());
        let metrics = MetricsLogger::new(dir).unwrap();
        let result  = train_loop::<TestBackend>(&cfg, train, val, &ckpt, &metrics, &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn evaluation_on_empty_set_is_nan() {
        let device = Default::default();
        let model  = tiny_model(&device);
        let loader = pair_loader::<NdArray>(PairDataset::new(vec![]), 4, None, &device);

        let eval = evaluate(&model, &TwinObjective::new(1.0), &loader);
        assert!(eval.mse.is_nan());
        assert!(eval.contrastive.is_nan());
    }

    #[test]
    fn evaluation_is_averaged_per_sample() {
        let device = Default::default();
        let model  = tiny_model(&device);
        let pairs  = SyntheticPairSource::new(5, VolumeDims::cube(32), 3).generate();

        // batching must not change the per-sample averages
        let by_two  = pair_loader::<NdArray>(PairDataset::new(pairs.clone()), 2, None, &device);
        let by_five = pair_loader::<NdArray>(PairDataset::new(pairs), 5, None, &device);
        let a = evaluate(&model, &TwinObjective::new(1.0), &by_two);
        let b = evaluate(&model, &TwinObjective::new(1.0), &by_five);
        assert!(a.mse.is_finite() && a.mae >= 0.0);
        assert!(a.contrastive >= 0.0 && a.contrastive <= 1.0);
        assert!(a.mae_x2.is_finite() && a.mae_x2 >= 0.0);
        assert!((a.mse - b.mse).abs() < 1e-4);
        assert!((a.mae - b.mae).abs() < 1e-4);
    }

    #[test]
    fn seeded_loader_visits_every_pair_once_per_epoch() {
        let device = Default::default();
        let pairs  = SyntheticPairSource::new(7, VolumeDims::cube(4), 5).generate();
        let loader = pair_loader::<NdArray>(PairDataset::new(pairs.clone()), 3, Some(42), &device);

        for _ in 0..2 {
            let mut seen: Vec<f32> = loader
                .iter()
                .flat_map(|batch| batch.y1.into_data().to_vec::<f32>().unwrap())
                .collect();
            let mut expected: Vec<f32> = pairs.iter().map(|p| p.y1).collect();
            seen.sort_by(|a, b| a.total_cmp(b));
            expected.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(seen, expected);
        }
    }
}

// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch:
//
//   epoch,train_loss,train_contrastive,train_regression,val_mse,val_mae,val_contrastive
//   1,0.912345,0.000000,0.912345,0.081234,0.240011,0.000000
//   ...
//
// train_loss is the mean total (contrastive + regression) over
// the epoch's batches. val_mse and val_mae are measured on
// branch 1 with the inference copy of the model; val_contrastive
// is the hinge on the same pairs.
//
// Output file: <checkpoint_dir>/metrics.csv

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

const HEADER: &str =
    "epoch,train_loss,train_contrastive,train_regression,val_mse,val_mae,val_contrastive";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:             usize,
    pub train_loss:        f64,
    pub train_contrastive: f64,
    pub train_regression:  f64,
    pub val_mse:           f64,
    pub val_mae:           f64,
    pub val_contrastive:   f64,
}

impl EpochMetrics {
    /// True if this epoch beat the previous best validation MSE
    pub fn is_improvement(&self, best_val_mse: f64) -> bool {
        self.val_mse < best_val_mse
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger, writing the header for a new file.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Existing logs are appended to across runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.train_contrastive,
            m.train_regression,
            m.val_mse,
            m.val_mae,
            m.val_contrastive,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_mse={:.4}",
            m.epoch,
            m.train_loss,
            m.val_mse,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: usize, val_mse: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss:        1.5,
            train_contrastive: 0.5,
            train_regression:  1.0,
            val_mse,
            val_mae:           0.3,
            val_contrastive:   0.125,
        }
    }

    #[test]
    fn test_is_improvement() {
        let m = row(2, 2.3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_rows_are_appended_under_one_header() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();

        let logger = MetricsLogger::new(dir.clone()).unwrap();
        logger.log(&row(1, 0.5)).unwrap();

        // a second logger on the same dir must not rewrite the header
        let logger = MetricsLogger::new(dir).unwrap();
        logger.log(&row(2, 0.25)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[2], "2,1.500000,0.500000,1.000000,0.250000,0.300000,0.125000");
    }
}

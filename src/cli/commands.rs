// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `summary`, with every
// hyperparameter exposed as a --flag.

use clap::{Args, Subcommand};
use crate::application::{summary_use_case::SummaryConfig, train_use_case::TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the twin 3D ResNet on synthetic paired volumes
    Train(TrainArgs),

    /// Print parameter count and feature shapes of a network
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory for checkpoints, config and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// ResNet depth: 10, 18, 34, 50, 101, 152 or 200
    #[arg(long, default_value_t = 101)]
    pub depth: usize,

    /// Width of the stem; stages use 1x, 2x, 4x, 8x of it
    #[arg(long, default_value_t = 64)]
    pub base_planes: usize,

    /// Spatial dropout rate inside residual blocks
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Margin of the contrastive hinge
    #[arg(long, default_value_t = 1.0)]
    pub margin: f64,

    /// Adam learning rate (fixed for the whole run)
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of synthetic scan pairs to generate
    #[arg(long, default_value_t = 64)]
    pub num_pairs: usize,

    /// Edge length of the cubic volumes (multiple of 32)
    #[arg(long, default_value_t = 64)]
    pub volume_size: usize,

    /// Share of pairs used for training; the rest validates
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Seed for data generation, split and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Continue from the latest checkpoint in --checkpoint-dir
    #[arg(long)]
    pub resume: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            checkpoint_dir: a.checkpoint_dir,
            depth:          a.depth,
            base_planes:    a.base_planes,
            dropout:        a.dropout,
            margin:         a.margin,
            lr:             a.lr,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            num_pairs:      a.num_pairs,
            volume_size:    a.volume_size,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            resume:         a.resume,
        }
    }
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[arg(long, default_value_t = 101)]
    pub depth: usize,

    #[arg(long, default_value_t = 64)]
    pub base_planes: usize,

    #[arg(long, default_value_t = 64)]
    pub volume_size: usize,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,
}

impl From<SummaryArgs> for SummaryConfig {
    fn from(a: SummaryArgs) -> Self {
        SummaryConfig {
            depth:       a.depth,
            base_planes: a.base_planes,
            volume_size: a.volume_size,
            batch_size:  a.batch_size,
        }
    }
}

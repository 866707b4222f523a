// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   1. `train`   — synthetic twin training run
//   2. `summary` — inspect a network configuration

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SummaryArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "twin-resnet3d",
    version = "0.1.0",
    about = "Train a shared-weight 3D ResNet on paired MRI volumes (regression + contrastive loss)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => Self::run_train(args),
            Commands::Summary(args) => Self::run_summary(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training, checkpoints in: {}", args.checkpoint_dir);

        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    fn run_summary(args: SummaryArgs) -> Result<()> {
        use crate::application::summary_use_case::SummaryUseCase;

        let summary = SummaryUseCase::new(args.into()).execute()?;

        println!("ResNet3d-{}  stages {:?}", summary.depth, summary.layers);
        println!("  parameters    {}", summary.num_params);
        println!("  input         {:?}", summary.input_shape);
        println!("  features      {:?}", summary.feature_shape);
        println!("  prediction    {:?}", summary.output_shape);
        println!("  projections   {}", summary.projections);
        Ok(())
    }
}

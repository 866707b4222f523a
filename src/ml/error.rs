// ============================================================
// Layer 5 — Shape Errors
// ============================================================
// Everything the ML layer can reject before a forward pass.
// Checked up front so a failed step never touches the weights.

use thiserror::Error;

/// Total spatial reduction of stem (×4) and stages 2–4 (×8).
pub const DOWNSAMPLE_FACTOR: usize = 32;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The two branches were fed volumes of different shape.
    #[error("paired volumes differ in shape: x1={x1:?}, x2={x2:?}")]
    PairMismatch { x1: [usize; 5], x2: [usize; 5] },

    /// The target batch does not line up with the input batch.
    #[error("target shape {target:?} does not match batch of {batch} with {outputs} output(s)")]
    TargetMismatch {
        target:  [usize; 2],
        batch:   usize,
        outputs: usize,
    },

    /// The volume channel axis disagrees with the configured `in_channels`.
    #[error("expected {expected} input channel(s), got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// A spatial axis would collapse under the 32× downsampling.
    #[error("spatial dims {spatial:?} are smaller than the {factor}x downsampling factor")]
    VolumeTooSmall { spatial: [usize; 3], factor: usize },

    #[error("batch is empty")]
    EmptyBatch,
}

/// Check one `[batch, channels, D, H, W]` shape against the configured channels.
pub fn check_volume(dims: [usize; 5], in_channels: usize) -> Result<(), ShapeError> {
    let [batch, channels, d, h, w] = dims;
    if batch == 0 {
        return Err(ShapeError::EmptyBatch);
    }
    if channels != in_channels {
        return Err(ShapeError::ChannelMismatch { expected: in_channels, actual: channels });
    }
    if [d, h, w].iter().any(|&s| s < DOWNSAMPLE_FACTOR) {
        return Err(ShapeError::VolumeTooSmall {
            spatial: [d, h, w],
            factor:  DOWNSAMPLE_FACTOR,
        });
    }
    Ok(())
}

/// Check a paired input plus its branch-1 target.
pub fn check_pair(
    x1:          [usize; 5],
    x2:          [usize; 5],
    y1:          [usize; 2],
    in_channels: usize,
    num_classes: usize,
) -> Result<(), ShapeError> {
    if x1 != x2 {
        return Err(ShapeError::PairMismatch { x1, x2 });
    }
    check_volume(x1, in_channels)?;
    if y1 != [x1[0], num_classes] {
        return Err(ShapeError::TargetMismatch {
            target:  y1,
            batch:   x1[0],
            outputs: num_classes,
        });
    }
    Ok(())
}

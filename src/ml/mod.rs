// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here:
//
//   layers.rs  — 3D max pool, global average pool, spatial
//                dropout, Kaiming fan-out conv helper
//   blocks.rs  — BasicBlock / Bottleneck residual blocks
//   resnet.rs  — ResNet3d backbone: forward_features + head
//   twin.rs    — TwinEncoder: one backbone, two inputs
//   loss.rs    — margin contrastive loss + MSE objective
//   step.rs    — TwinTrainer: one validated optimisation step
//   trainer.rs — epoch loop, validation, checkpoints
//   error.rs   — ShapeError and input checks
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// Input shape checks shared by the backbone and the training step
pub mod error;

/// Volumetric helpers Burn does not ship
pub mod layers;

/// Residual blocks (basic and bottleneck)
pub mod blocks;

/// 3D ResNet backbone
pub mod resnet;

/// Shared-weight twin encoder
pub mod twin;

/// Contrastive + regression objective
pub mod loss;

/// Single training step
pub mod step;

/// Full training loop with validation and checkpointing
pub mod trainer;

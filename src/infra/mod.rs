// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the application and ml layers:
//
//   checkpoint.rs — model weights (Burn MessagePack + gzip
//                   recorder) and the run's TrainConfig as JSON
//
//   metrics.rs    — per-epoch loss / validation metrics appended
//                   to a CSV file

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From paired scans to device-ready tensor batches:
//
//   PairSource (SyntheticPairSource)  → Vec<PairedScan>
//       │
//       ▼
//   split_train_val                   → seeded 80/20 split
//       │
//       ▼
//   PairDataset                       → Burn Dataset
//       │
//       ▼
//   PairBatcher                       → PairBatch { x1, x2, y1, y2 }
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Seeded synthetic brain-like volume pairs
pub mod synthetic;

/// Implements Burn's Dataset trait for paired scans
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits pairs into train/validation sets
pub mod splitter;

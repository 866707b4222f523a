// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Volume ingestion is deliberately outside this crate: anything
// that can hand over paired scans plugs in here.
//
// Implementations:
//   - SyntheticPairSource → seeded synthetic "brain" volumes
//   - (future) a NIfTI reader producing the same PairedScan values

use anyhow::Result;
use crate::domain::scan::PairedScan;

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Any component that can produce paired scans for training.
pub trait PairSource {
    /// Load every available pair. All pairs share one `VolumeDims`.
    fn load_pairs(&self) -> Result<Vec<PairedScan>>;
}

// ============================================================
// Layer 3 — PairedScan Domain Type
// ============================================================
// Two single-channel MRI volumes that belong together, e.g. the
// same subject at two timepoints or a matched case/control pair,
// plus one regression target per scan.
//
// Voxels are stored flat in depth-major order (D, then H, then W),
// which is exactly the memory layout of a [1, D, H, W] tensor.

use serde::{Deserialize, Serialize};

/// Spatial extent of a volume: (depth, height, width).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDims {
    pub depth:  usize,
    pub height: usize,
    pub width:  usize,
}

impl VolumeDims {
    pub fn new(depth: usize, height: usize, width: usize) -> Self {
        Self { depth, height, width }
    }

    pub fn cube(size: usize) -> Self {
        Self::new(size, size, size)
    }

    pub fn voxels(&self) -> usize {
        self.depth * self.height * self.width
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// Flat index of voxel (z, y, x).
    pub fn index(&self, z: usize, y: usize, x: usize) -> usize {
        (z * self.height + y) * self.width + x
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedScan {
    pub dims: VolumeDims,
    /// First scan; its target is the supervised one.
    pub x1:   Vec<f32>,
    pub x2:   Vec<f32>,
    pub y1:   f32,
    /// Target of the second scan. Kept with the pair, never supervised.
    pub y2:   f32,
}

impl PairedScan {
    pub fn new(dims: VolumeDims, x1: Vec<f32>, x2: Vec<f32>, y1: f32, y2: f32) -> Self {
        Self { dims, x1, x2, y1, y2 }
    }

    /// Both volumes hold exactly `dims.voxels()` values.
    pub fn is_consistent(&self) -> bool {
        let n = self.dims.voxels();
        self.x1.len() == n && self.x2.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_depth_major() {
        let dims = VolumeDims::new(2, 3, 4);
        assert_eq!(dims.voxels(), 24);
        assert_eq!(dims.index(0, 0, 1), 1);
        assert_eq!(dims.index(0, 1, 0), 4);
        assert_eq!(dims.index(1, 0, 0), 12);
        assert_eq!(dims.index(1, 2, 3), 23);
    }

    #[test]
    fn consistency_checks_both_volumes() {
        let dims = VolumeDims::cube(2);
        let ok   = PairedScan::new(dims, vec![0.0; 8], vec![1.0; 8], 0.5, 0.6);
        let bad  = PairedScan::new(dims, vec![0.0; 8], vec![1.0; 7], 0.5, 0.6);
        assert!(ok.is_consistent());
        assert!(!bad.is_consistent());
    }
}

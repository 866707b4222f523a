// ============================================================
// Layer 4 — Synthetic Paired Scans
// ============================================================
// Stand-in for a neuroimaging archive. Each subject gets a latent
// "age" a ∈ [0, 1) that shapes a smooth brain-like volume:
//
//   brain radius      0.42 − 0.08·a    (atrophy)
//   ventricle radius  0.06 + 0.10·a    (enlargement)
//
// The second scan of a pair is the same subject at a later
// timepoint (a₂ = a₁ + δ), rendered with fresh noise. Targets are
// the latent values themselves, so the regression is learnable
// from the volumes alone.
//
// Everything is driven by one seeded StdRng, so a given
// (pairs, dims, seed) always yields the same data.

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::scan::{PairedScan, VolumeDims};
use crate::domain::traits::PairSource;

const BRAIN_RADIUS:     f32 = 0.42;
const BRAIN_ATROPHY:    f32 = 0.08;
const VENTRICLE_RADIUS: f32 = 0.06;
const VENTRICLE_GROWTH: f32 = 0.10;
const VENTRICLE_DEPTH:  f32 = 0.6;
/// Amplitude of the uniform voxel noise.
const NOISE:            f32 = 0.05;

#[derive(Debug, Clone)]
pub struct SyntheticPairSource {
    pairs: usize,
    dims:  VolumeDims,
    seed:  u64,
}

impl SyntheticPairSource {
    pub fn new(pairs: usize, dims: VolumeDims, seed: u64) -> Self {
        Self { pairs, dims, seed }
    }

    pub fn generate(&self) -> Vec<PairedScan> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.pairs)
            .map(|_| {
                let age1  = rng.gen_range(0.0f32..0.9);
                let age2  = (age1 + rng.gen_range(0.02f32..0.12)).min(1.0);
                let x1    = render_volume(self.dims, age1, NOISE, &mut rng);
                let x2    = render_volume(self.dims, age2, NOISE, &mut rng);
                PairedScan::new(self.dims, x1, x2, age1, age2)
            })
            .collect()
    }
}

impl PairSource for SyntheticPairSource {
    fn load_pairs(&self) -> Result<Vec<PairedScan>> {
        let pairs = self.generate();
        tracing::debug!(
            "Generated {} synthetic pairs of {:?} (seed {})",
            pairs.len(), self.dims.as_array(), self.seed,
        );
        Ok(pairs)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Render one volume for latent age `age`, depth-major.
fn render_volume(dims: VolumeDims, age: f32, noise: f32, rng: &mut StdRng) -> Vec<f32> {
    let brain_r     = BRAIN_RADIUS - BRAIN_ATROPHY * age;
    let ventricle_r = VENTRICLE_RADIUS + VENTRICLE_GROWTH * age;

    // centred coordinates in [-0.5, 0.5] per axis
    let centre = |i: usize, n: usize| (i as f32 + 0.5) / n as f32 - 0.5;

    let mut voxels = vec![0.0f32; dims.voxels()];
    for z in 0..dims.depth {
        let dz = centre(z, dims.depth);
        for y in 0..dims.height {
            let dy = centre(y, dims.height);
            for x in 0..dims.width {
                let dx   = centre(x, dims.width);
                let dist = (dx * dx + dy * dy + dz * dz).sqrt();

                let tissue    = sigmoid((brain_r - dist) / 0.03);
                let ventricle = sigmoid((ventricle_r - dist) / 0.02);
                let jitter    = if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };

                voxels[dims.index(z, y, x)] = tissue - VENTRICLE_DEPTH * ventricle + jitter;
            }
        }
    }
    voxels
}

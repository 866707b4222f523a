use burn::data::dataset::Dataset;

use crate::domain::scan::PairedScan;

/// In-memory collection of paired scans, all of the same size.
pub struct PairDataset {
    pairs: Vec<PairedScan>,
}

impl PairDataset {
    pub fn new(pairs: Vec<PairedScan>) -> Self { Self { pairs } }
}

impl Dataset<PairedScan> for PairDataset {
    fn get(&self, index: usize) -> Option<PairedScan> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

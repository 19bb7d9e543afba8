use crate::cell::Cell;
use float_ord::FloatOrd;
use rand::{Rng, RngCore};

/// Strategy for choosing the next cell to collapse.
pub trait EntropyCalculator {
    /// Entropy of an uncollapsed cell with `count` possibilities, before any
    /// tie-breaking noise.
    #[must_use]
    fn entropy(&self, count: usize) -> f32;

    /// Index of the uncollapsed cell with the lowest entropy, or `None` when
    /// every cell is collapsed.
    #[must_use]
    fn find_lowest_entropy(&self, cells: &[Cell], rng: &mut dyn RngCore) -> Option<usize>;
}

/// `ln(count)` plus a seeded jitter that breaks ties without reordering
/// distinct counts.
#[derive(Debug, Clone)]
pub struct LogCountEntropy {
    max_jitter: f32,
}

impl LogCountEntropy {
    /// The jitter stays below half of the smallest gap `ln(n + 1) - ln(n)`
    /// for `n <= num_states`.
    pub fn new(num_states: usize) -> Self {
        let n = num_states.max(1) as f32;
        Self {
            max_jitter: 0.5 * (1.0 / n).ln_1p(),
        }
    }

    pub fn max_jitter(&self) -> f32 {
        self.max_jitter
    }
}

impl EntropyCalculator for LogCountEntropy {
    fn entropy(&self, count: usize) -> f32 {
        (count.max(1) as f32).ln()
    }

    fn find_lowest_entropy(&self, cells: &[Cell], rng: &mut dyn RngCore) -> Option<usize> {
        // Exact ties left after jitter go to the first listed cell.
        cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_collapsed())
            .map(|(index, cell)| {
                let jitter = rng.gen::<f32>() * self.max_jitter;
                (index, FloatOrd(self.entropy(cell.count()) + jitter))
            })
            .min_by_key(|&(_, entropy)| entropy)
            .map(|(index, _)| index)
    }
}

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use vecbulk_common::{Result, VecBulkError};

use crate::types::Distribution;

/// Create the random source for a run
///
/// Seeded runs are reproducible; without a seed the generator draws from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

impl Distribution {
    /// Draw a single component
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Uniform => rng.gen::<f64>(),
            Self::Normal => rng.sample::<f64, _>(StandardNormal),
        }
    }
}

/// Draw one vector of `dim` components
pub fn sample_vector<R: Rng>(distribution: Distribution, rng: &mut R, dim: usize) -> Array1<f64> {
    (0..dim).map(|_| distribution.sample(rng)).collect()
}

/// Draw a `rows x dim` batch
///
/// Components are drawn in row-major order, so a batch of `a + b` rows holds
/// the same values as a batch of `a` rows followed by a batch of `b` rows.
pub fn sample_batch<R: Rng>(
    distribution: Distribution,
    rng: &mut R,
    rows: usize,
    dim: usize,
) -> Result<Array2<f64>> {
    let len = rows
        .checked_mul(dim)
        .ok_or_else(|| VecBulkError::invalid_argument(format!("Batch of {}x{} components overflows", rows, dim)))?;
    let values: Vec<f64> = (0..len).map(|_| distribution.sample(rng)).collect();

    Array2::from_shape_vec((rows, dim), values)
        .map_err(|e| VecBulkError::invalid_argument(format!("Invalid batch shape {}x{}: {}", rows, dim, e)))
}

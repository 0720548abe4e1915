//! Gaussian summary of a timing sequence and a similarity heuristic.
//!
//! The similarity score is `2 * Phi(-|delta| / sigma)`: 1.0 when the means
//! coincide and falling towards 0 as they drift apart, reaching exactly 0.0
//! once the tail underflows. It is a quick closeness heuristic, not a
//! calibrated probability or a test p-value.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use std::fmt;
use thiserror::Error;

/// Smallest number of samples a model is estimated from.
pub const MIN_SAMPLES: usize = 2;

/// Floor for the standard deviation, as a fraction of the mean.
const STDDEV_FLOOR_RATIO: f64 = 0.01;

/// Errors from model estimation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("insufficient data: need at least {required} samples, got {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("degenerate spread: samples with mean {mean} have no usable standard deviation")]
    DegenerateSpread { mean: f64 },
}

/// Normal distribution parameters estimated from timing samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianModel {
    pub mean: f64,
    pub stddev: f64,
    pub nsamples: usize,
}

impl GaussianModel {
    /// Estimate mean and spread from `samples`.
    ///
    /// The spread is the population standard deviation, floored at 1% of the
    /// mean so identical samples still give a usable model. Scores computed
    /// elsewhere depend on this exact formula.
    pub fn estimate_parameters(samples: &[f64]) -> Result<Self, ModelError> {
        let nsamples = samples.len();
        if nsamples < MIN_SAMPLES {
            return Err(ModelError::InsufficientData {
                required: MIN_SAMPLES,
                found: nsamples,
            });
        }

        let n = nsamples as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt().max(mean * STDDEV_FLOOR_RATIO);

        if !(stddev > 0.0) {
            return Err(ModelError::DegenerateSpread { mean });
        }

        Ok(Self {
            mean,
            stddev,
            nsamples,
        })
    }

    /// Closeness of two models in `[0, 1]`, using their averaged spread.
    pub fn similarity(&self, other: &GaussianModel) -> f64 {
        let stddev = (self.stddev + other.stddev) / 2.0;
        two_sided_tail((self.mean - other.mean).abs() / stddev)
    }

    /// Closeness of a single observation to this model, using only this
    /// model's spread.
    pub fn similarity_to_sample(&self, x: f64) -> f64 {
        two_sided_tail((self.mean - x).abs() / self.stddev)
    }
}

impl fmt::Display for GaussianModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N({:.2}, {:.2}; n={})", self.mean, self.stddev, self.nsamples)
    }
}

/// `2 * Phi(-z)` for `z >= 0`, where Phi is the standard normal CDF.
fn two_sided_tail(z: f64) -> f64 {
    erfc(z / SQRT_2)
}

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::GaussianProcessError;

/// Model of noise to use in Gaussian Process
///
/// The values are added to the diagonal of the training covariance as they
/// are, i.e. they are variances. Besides modelling observation noise this
/// keeps the Cholesky factorization stable.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum NoiseModel {
    /// The same noise is applied to all values
    Uniform(f64),
    /// Different noise values are applied to each y-value
    PerPoint(DVector<f64>),
}

impl Default for NoiseModel {
    fn default() -> Self {
        NoiseModel::Uniform(1E-10)
    }
}

impl NoiseModel {
    /// Check that the noise values are non-negative and finite
    pub fn validate(&self) -> Result<(), GaussianProcessError> {
        let valid = |x: &f64| x.is_finite() && *x >= 0.0;
        match self {
            NoiseModel::Uniform(noise) if valid(noise) => Ok(()),
            NoiseModel::Uniform(noise) => Err(GaussianProcessError::InvalidNoise(
                format!("noise must be finite and non-negative, got {noise}"),
            )),
            NoiseModel::PerPoint(noise) if noise.iter().all(valid) => Ok(()),
            NoiseModel::PerPoint(_) => Err(GaussianProcessError::InvalidNoise(
                "every per-point noise must be finite and non-negative"
                    .to_string(),
            )),
        }
    }

    /// Enact the given noise model onto the given covariance matrix
    pub fn add_noise_to_kernel(
        &self,
        mut cov: DMatrix<f64>,
    ) -> Result<DMatrix<f64>, GaussianProcessError> {
        match self {
            NoiseModel::Uniform(noise) => {
                for i in 0..cov.nrows().min(cov.ncols()) {
                    cov[(i, i)] += noise;
                }
                Ok(cov)
            }
            NoiseModel::PerPoint(sigma) => {
                if cov.nrows() == sigma.nrows() {
                    Ok(cov + DMatrix::from_diagonal(sigma))
                } else {
                    Err(GaussianProcessError::DimensionMismatch {
                        expected: cov.nrows(),
                        given: sigma.nrows(),
                    })
                }
            }
        }
    }
}

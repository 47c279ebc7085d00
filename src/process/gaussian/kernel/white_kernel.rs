use super::{
    check_hyperparameter, format_g, single_parameter, Bounds, CovGrad,
    CovGradError, Hyperparameter, Kernel, KernelError,
};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::f64;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// White Noise Kernel
///
/// Adds `noise_level` to the variance of every point. Two different sets of
/// points are uncorrelated, so `covariance(x1, x2)` is all zeros while
/// `self_covariance(x)` is `noise_level * I`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct WhiteKernel {
    /// Level of the noise
    noise_level: f64,
    bounds: Bounds,
}

impl WhiteKernel {
    /// Create a new WhiteKernel with the given level of noise and default
    /// bounds `(1e-5, 1e5)`
    pub fn new(noise_level: f64) -> Result<Self, KernelError> {
        let noise_level = check_hyperparameter("noise_level", noise_level)?;
        Ok(Self {
            noise_level,
            bounds: Bounds::default(),
        })
    }

    /// Create a new WhiteKernel without check the parameters
    #[must_use]
    pub fn new_unchecked(noise_level: f64) -> Self {
        Self {
            noise_level,
            bounds: Bounds::default(),
        }
    }

    /// Set the search range of `noise_level`
    #[must_use]
    pub fn with_bounds(self, bounds: Bounds) -> Self {
        Self { bounds, ..self }
    }

    #[must_use]
    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

impl Default for WhiteKernel {
    fn default() -> Self {
        Self::new_unchecked(1.0)
    }
}

impl fmt::Display for WhiteKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WhiteKernel(noise_level={})", format_g(self.noise_level, 3))
    }
}

impl Kernel for WhiteKernel {
    fn n_parameters(&self) -> usize {
        usize::from(!self.bounds.is_fixed())
    }

    fn covariance<R1, R2, C1, C2, S1, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        x2: &Matrix<f64, R2, C2, S2>,
    ) -> DMatrix<f64>
    where
        R1: Dim,
        R2: Dim,
        C1: Dim,
        C2: Dim,
        S1: Storage<f64, R1, C1>,
        S2: Storage<f64, R2, C2>,
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        DMatrix::zeros(x1.nrows(), x2.nrows())
    }

    fn self_covariance<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let n = x.nrows();
        DMatrix::from_diagonal_element(n, n, self.noise_level)
    }

    fn is_stationary(&self) -> bool {
        true
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        DVector::from_element(x.nrows(), self.noise_level)
    }

    fn parameters(&self) -> DVector<f64> {
        if self.bounds.is_fixed() {
            DVector::zeros(0)
        } else {
            DVector::from_element(1, self.noise_level.ln())
        }
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.ln_bounds().into_iter().collect()
    }

    fn hyperparameters(&self) -> Vec<Hyperparameter> {
        vec![Hyperparameter::new(
            "noise_level",
            self.noise_level,
            self.bounds,
        )]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        let noise_level = single_parameter(
            "noise_level",
            self.bounds,
            self.noise_level,
            params,
        )?;
        Ok(Self {
            noise_level,
            ..*self
        })
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let n = x.nrows();
        let cov = self.self_covariance(x);
        let grad = if self.bounds.is_fixed() {
            CovGrad::empty(n)
        } else {
            CovGrad::from_slice(cov.clone())
        };
        Ok((cov, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_kernel() -> Result<(), KernelError> {
        const PI: f64 = std::f64::consts::PI;
        let kernel = WhiteKernel::new(PI)?;

        assert::close(kernel.parameters()[0], PI.ln(), 1E-10);

        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = DMatrix::from_row_slice(2, 2, &[5.0, 7.0, 6.0, 8.0]);

        let cov = kernel.covariance(&x, &y);
        let expected_cov = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 0.0]);
        assert!(cov.relative_eq(&expected_cov, 1E-8, 1E-8));

        // Equal points from two sets are still uncorrelated
        assert_eq!(kernel.covariance(&x, &x), DMatrix::zeros(2, 2));

        let (cov, grad) = kernel.covariance_with_gradient(&x)?;

        let expected_cov = DMatrix::from_row_slice(2, 2, &[PI, 0.0, 0.0, PI]);

        let expected_grad =
            CovGrad::from_row_slices(2, 1, &[PI, 0.0, 0.0, PI])?;
        assert!(cov.relative_eq(&expected_cov, 1E-8, 1E-8));
        assert!(grad.relative_eq(&expected_grad, 1E-8, 1E-8));
        assert_eq!(kernel.self_covariance(&x), cov);
        assert_eq!(kernel.diag(&x), DVector::from_element(2, PI));
        Ok(())
    }

    #[test]
    fn white_kernel_display() {
        let kernel = WhiteKernel::new_unchecked(0.01);
        assert_eq!(kernel.to_string(), "WhiteKernel(noise_level=0.01)");
        let hp = &kernel.hyperparameters()[0];
        assert_eq!(hp.name, "noise_level");
        assert_eq!(hp.bounds, Bounds::default());
    }
}

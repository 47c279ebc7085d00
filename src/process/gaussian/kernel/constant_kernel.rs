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

/// Constant kernel, `k(x, x') = c`.
///
/// Multiplied with another kernel it sets the signal variance; added to one it
/// models a constant mean offset.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ConstantKernel {
    value: f64,
    bounds: Bounds,
}

impl ConstantKernel {
    /// Create a new constant kernel with default bounds `(1e-5, 1e5)`
    pub fn new(value: f64) -> Result<Self, KernelError> {
        let value = check_hyperparameter("constant_value", value)?;
        Ok(Self {
            value,
            bounds: Bounds::default(),
        })
    }

    /// Create a new `ConstantKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(value: f64) -> Self {
        Self {
            value,
            bounds: Bounds::default(),
        }
    }

    /// Set the search range of `constant_value`
    #[must_use]
    pub fn with_bounds(self, bounds: Bounds) -> Self {
        Self { bounds, ..self }
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

impl Default for ConstantKernel {
    fn default() -> Self {
        Self::new_unchecked(1.0)
    }
}

impl fmt::Display for ConstantKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}**2", format_g(self.value.sqrt(), 3))
    }
}

impl Kernel for ConstantKernel {
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
        DMatrix::from_element(x1.nrows(), x2.nrows(), self.value)
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
        DVector::from_element(x.nrows(), self.value)
    }

    fn parameters(&self) -> DVector<f64> {
        if self.bounds.is_fixed() {
            DVector::zeros(0)
        } else {
            DVector::from_element(1, self.value.ln())
        }
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.ln_bounds().into_iter().collect()
    }

    fn hyperparameters(&self) -> Vec<Hyperparameter> {
        vec![Hyperparameter::new("constant_value", self.value, self.bounds)]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        let value =
            single_parameter("constant_value", self.bounds, self.value, params)?;
        Ok(Self { value, ..*self })
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
        let cov = DMatrix::from_element(n, n, self.value);
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
    fn constant_kernel() -> Result<(), KernelError> {
        let kernel = ConstantKernel::new(3.0)?;
        assert::close(kernel.parameters()[0], 3.0_f64.ln(), 1E-10);

        let x = DMatrix::from_column_slice(2, 2, &[1.0, 3.0, 2.0, 4.0]);
        let y = DMatrix::from_column_slice(2, 2, &[5.0, 6.0, 7.0, 8.0]);

        let (cov, grad) = kernel.covariance_with_gradient(&x)?;

        let expected_cov = DMatrix::from_row_slice(2, 2, &[3.0, 3.0, 3.0, 3.0]);

        let expected_grad =
            CovGrad::from_row_slices(2, 1, &[3.0, 3.0, 3.0, 3.0])?;

        assert!(cov.relative_eq(&expected_cov, 1E-8, 1E-8));
        assert!(grad.relative_eq(&expected_grad, 1E-8, 1E-8));

        let cov = kernel.covariance(&x, &y);
        assert!(cov.relative_eq(&expected_cov, 1E-8, 1E-8));
        assert_eq!(kernel.diag(&x), DVector::from_element(2, 3.0));
        Ok(())
    }

    #[test]
    fn constant_kernel_display() {
        assert_eq!(ConstantKernel::new_unchecked(0.1296).to_string(), "0.36**2");
        assert_eq!(ConstantKernel::new_unchecked(1.0).to_string(), "1**2");
    }

    #[test]
    fn fixed_constant_has_no_parameters() -> Result<(), KernelError> {
        let kernel = ConstantKernel::new(2.0)?.with_bounds(Bounds::Fixed);
        assert_eq!(kernel.n_parameters(), 0);
        assert_eq!(kernel.parameters().len(), 0);
        assert!(kernel.parameter_bounds().is_empty());
        assert_eq!(kernel.reparameterize(&[])?, kernel);
        assert_eq!(
            kernel.reparameterize(&[0.0]),
            Err(KernelError::ExtraneousParameters(1))
        );

        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);
        let (cov, grad) = kernel.covariance_with_gradient(&x)?;
        assert_eq!(cov, DMatrix::from_element(3, 3, 2.0));
        assert_eq!(grad.n_parameters(), 0);
        Ok(())
    }

    #[test]
    fn rejects_non_positive_values() {
        assert!(ConstantKernel::new(0.0).is_err());
        assert!(ConstantKernel::new(-1.0).is_err());
        assert!(ConstantKernel::new(f64::NAN).is_err());
        let kernel = ConstantKernel::default();
        assert!(kernel.reparameterize(&[f64::INFINITY]).is_err());
    }
}

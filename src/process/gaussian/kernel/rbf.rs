use super::{
    check_hyperparameter, e2_norm, format_g, single_parameter, Bounds, CovGrad,
    CovGradError, Hyperparameter, Kernel, KernelError,
};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::f64;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Radial-basis function (RBF) kernel
/// The distance metric here is L2 (Euclidean).
///
/// ```math
///     K(\mathbf{x}, \mathbf{x'}) = \exp\left(-\frac{\|\mathbf{x} - \mathbf{x'}\|^2}{2l^2}\right)
/// ```
///
/// # Parameters
/// * `l` - Length scale.
///
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct RBFKernel {
    length_scale: f64,
    bounds: Bounds,
}

impl RBFKernel {
    /// Create a new rbf kernel with the given length scale and default
    /// bounds `(1e-5, 1e5)`
    pub fn new(length_scale: f64) -> Result<Self, KernelError> {
        let length_scale = check_hyperparameter("length_scale", length_scale)?;
        Ok(Self {
            length_scale,
            bounds: Bounds::default(),
        })
    }

    /// Create a new `RBFKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: f64) -> Self {
        Self {
            length_scale,
            bounds: Bounds::default(),
        }
    }

    /// Set the search range of `length_scale`
    #[must_use]
    pub fn with_bounds(self, bounds: Bounds) -> Self {
        Self { bounds, ..self }
    }

    #[must_use]
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self::new_unchecked(1.0)
    }
}

impl fmt::Display for RBFKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RBF(length_scale={})", format_g(self.length_scale, 3))
    }
}

impl Kernel for RBFKernel {
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
        DMatrix::from_fn(x1.nrows(), x2.nrows(), |i, j| {
            let d2 = e2_norm(&x1.row(i), &x2.row(j), self.length_scale);
            (-0.5 * d2).exp()
        })
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
        DVector::repeat(x.nrows(), 1.0)
    }

    fn parameters(&self) -> DVector<f64> {
        if self.bounds.is_fixed() {
            DVector::zeros(0)
        } else {
            DVector::from_element(1, self.length_scale.ln())
        }
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.ln_bounds().into_iter().collect()
    }

    fn hyperparameters(&self) -> Vec<Hyperparameter> {
        vec![Hyperparameter::new(
            "length_scale",
            self.length_scale,
            self.bounds,
        )]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        let length_scale = single_parameter(
            "length_scale",
            self.bounds,
            self.length_scale,
            params,
        )?;
        Ok(Self {
            length_scale,
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

        let mut dm = DMatrix::zeros(n, n);
        let mut grad = CovGrad::zeros(n, 1);

        for i in 0..n {
            for j in 0..i {
                // Save covariance
                let d2 = e2_norm(&x.row(i), &x.row(j), self.length_scale);
                let cov_ij = (-d2 / 2.0).exp();

                dm[(i, j)] = cov_ij;
                dm[(j, i)] = cov_ij;

                // Save gradient
                let dc_dl = d2 * cov_ij;
                grad[(i, j, 0)] = dc_dl;
                grad[(j, i, 0)] = dc_dl;
            }
            dm[(i, i)] = 1.0;
        }

        if self.bounds.is_fixed() {
            Ok((dm, CovGrad::empty(n)))
        } else {
            Ok((dm, grad))
        }
    }
}

//! Covariance kernels for Gaussian processes
//!
//! Kernels are parameterized by positive hyperparameters. The optimizer works
//! on `theta`, the vector of natural logs of the hyperparameters that are not
//! fixed, concatenated left operand first for composite kernels.

use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::f64;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

mod covgrad;
pub use covgrad::*;

mod misc;
pub use self::misc::*;

mod constant_kernel;
pub use self::constant_kernel::*;

mod ops;
pub use self::ops::*;

mod rbf;
pub use self::rbf::*;
mod white_kernel;
pub use self::white_kernel::*;

/// Search range of a single hyperparameter
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum Bounds {
    /// The hyperparameter is held at its value
    Fixed,
    /// The hyperparameter may vary within `[lower, upper]` (natural scale)
    Range { lower: f64, upper: f64 },
}

impl Bounds {
    /// Create a new search range.
    ///
    /// Both ends must be finite and `0 < lower < upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self, KernelError> {
        if lower.is_finite() && upper.is_finite() && 0.0 < lower && lower < upper
        {
            Ok(Self::Range { lower, upper })
        } else {
            Err(KernelError::InvalidBounds(lower, upper))
        }
    }

    /// Bounds that keep the hyperparameter fixed
    #[must_use]
    pub fn fixed() -> Self {
        Self::Fixed
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// The bounds on the log scale, `None` when fixed
    #[must_use]
    pub fn ln_bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::Fixed => None,
            Self::Range { lower, upper } => Some((lower.ln(), upper.ln())),
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::Range {
            lower: 1E-5,
            upper: 1E5,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Range { lower, upper } => write!(
                f,
                "({}, {})",
                format_g(*lower, 3),
                format_g(*upper, 3)
            ),
        }
    }
}

/// Description of one hyperparameter of a kernel
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Hyperparameter {
    /// Name, prefixed with `k1__`/`k2__` inside composite kernels
    pub name: String,
    /// Current value (natural scale)
    pub value: f64,
    /// Search range
    pub bounds: Bounds,
}

impl Hyperparameter {
    pub fn new(name: &str, value: f64, bounds: Bounds) -> Self {
        Self {
            name: name.to_string(),
            value,
            bounds,
        }
    }

    /// Same hyperparameter with `prefix` in front of its name
    #[must_use]
    pub fn prefixed(self, prefix: &str) -> Self {
        Self {
            name: format!("{prefix}{}", self.name),
            ..self
        }
    }
}

/// Kernel Function
pub trait Kernel: std::fmt::Debug + fmt::Display + Clone + PartialEq {
    /// Number of free (non-fixed) hyperparameters
    fn n_parameters(&self) -> usize;

    /// Returns the covariance matrix between the rows of `x1` and `x2`
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
        ShapeConstraint: SameNumberOfColumns<C1, C2>;

    /// Covariance of a set of points with itself.
    ///
    /// This differs from `covariance(x, x)` for kernels, like white noise,
    /// that only correlate a point with itself and not with an equal point
    /// from another set.
    fn self_covariance<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DMatrix<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        self.covariance(x, x)
    }

    /// Reports if the given kernel function is stationary.
    fn is_stationary(&self) -> bool;

    /// Returns the diagonal of `self_covariance(x)`
    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>;

    /// Return the corresponding parameter vector
    /// The parameters here are in a log-scale
    fn parameters(&self) -> DVector<f64>;

    /// Bounds of each entry of `parameters()`, in a log-scale
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// Every hyperparameter, fixed ones included
    fn hyperparameters(&self) -> Vec<Hyperparameter>;

    /// Create a new kernel of the same type from the provided parameters.
    /// The parameters here are in a log-scale
    ///
    /// Values outside of the bounds are accepted; bounds only restrict the
    /// optimizer.
    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError>;

    /// Takes a sequence of parameters and consumes only the ones it needs
    /// to create itself.
    /// The parameters here are in a log-scale
    fn consume_parameters<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(Self, &'p [f64]), KernelError> {
        let n = self.n_parameters();
        if params.len() < n {
            Err(KernelError::MissingParameters(n - params.len()))
        } else {
            let (cur, next) = params.split_at(n);
            let kernel = self.reparameterize(cur)?;
            Ok((kernel, next))
        }
    }

    /// Covariance and Gradient with the log-scaled hyper-parameters
    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>;

    /// Clip a log-scale parameter vector onto `parameter_bounds()`
    fn clip_parameters(&self, params: &DVector<f64>) -> DVector<f64> {
        let bounds = self.parameter_bounds();
        DVector::from_iterator(
            params.len(),
            params
                .iter()
                .zip(bounds.iter())
                .map(|(p, &(lower, upper))| p.clamp(lower, upper)),
        )
    }

    /// Position of the named hyperparameter in `parameters()`
    fn parameter_index(&self, name: &str) -> Result<usize, KernelError> {
        self.hyperparameters()
            .iter()
            .filter(|h| !h.bounds.is_fixed())
            .position(|h| h.name == name)
            .ok_or_else(|| KernelError::UnknownParameter(name.to_string()))
    }

    fn add<B: Kernel>(self, other: B) -> AddKernel<Self, B> {
        AddKernel::new(self, other)
    }

    fn mul<B: Kernel>(self, other: B) -> ProductKernel<Self, B> {
        ProductKernel::new(self, other)
    }
}

/// Check that `value` is a valid (positive, finite) hyperparameter
pub(crate) fn check_hyperparameter(
    name: &str,
    value: f64,
) -> Result<f64, KernelError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(KernelError::ParameterOutOfBounds {
            name: name.to_string(),
            given: value,
            bounds: (0.0, f64::INFINITY),
        })
    }
}

/// Reparameterize a kernel with a single hyperparameter
pub(crate) fn single_parameter(
    name: &str,
    bounds: Bounds,
    current: f64,
    params: &[f64],
) -> Result<f64, KernelError> {
    match (bounds, params) {
        (Bounds::Fixed, []) => Ok(current),
        (Bounds::Fixed, _) => Err(KernelError::ExtraneousParameters(params.len())),
        (Bounds::Range { .. }, []) => Err(KernelError::MissingParameters(1)),
        (Bounds::Range { .. }, [value]) => check_hyperparameter(name, value.exp()),
        (Bounds::Range { .. }, _) => {
            Err(KernelError::ExtraneousParameters(params.len() - 1))
        }
    }
}

/// Errors from Kernel construction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum KernelError {
    /// Bounds must be finite, positive and in order
    InvalidBounds(f64, f64),
    /// Parameter Out of Bounds
    ParameterOutOfBounds {
        /// Name of parameter
        name: String,
        /// Value given
        given: f64,
        /// Lower and upper bounds on value
        bounds: (f64, f64),
    },
    /// Too many parameters provided
    ExtraneousParameters(usize),
    /// Too few parameters provided
    MissingParameters(usize),
    /// No free hyperparameter has the given name
    UnknownParameter(String),
    /// An error in computing cov-grad
    CovGrad(CovGradError),
}

impl std::error::Error for KernelError {}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBounds(lower, upper) => write!(
                f,
                "Bounds must satisfy 0 < lower < upper < inf: ({}, {})",
                lower, upper
            ),
            Self::ParameterOutOfBounds {
                name,
                given,
                bounds,
            } => write!(
                f,
                "Parameter {} is out of bounds ({}, {}), given: {}",
                name, bounds.0, bounds.1, given
            ),
            Self::ExtraneousParameters(n) => {
                write!(f, "{} extra parameters provided to kernel", n)
            }
            Self::MissingParameters(n) => {
                write!(f, "Missing {} parameters", n)
            }
            Self::UnknownParameter(name) => {
                write!(f, "No free hyperparameter named '{}'", name)
            }
            Self::CovGrad(e) => {
                write!(f, "Covariance Gradient couldn't be computed: {}", e)
            }
        }
    }
}

impl From<CovGradError> for KernelError {
    fn from(e: CovGradError) -> Self {
        Self::CovGrad(e)
    }
}

macro_rules! impl_mul_add {
    ($type: ty) => {
        impl<B> std::ops::Mul<B> for $type
        where
            B: Kernel,
        {
            type Output = ProductKernel<$type, B>;

            fn mul(self, rhs: B) -> Self::Output {
                ProductKernel::new(self, rhs)
            }
        }

        impl<B> std::ops::Add<B> for $type
        where
            B: Kernel,
        {
            type Output = AddKernel<$type, B>;

            fn add(self, rhs: B) -> Self::Output {
                AddKernel::new(self, rhs)
            }
        }
    };
}

impl_mul_add!(ConstantKernel);
impl_mul_add!(RBFKernel);
impl_mul_add!(WhiteKernel);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_validation() {
        assert!(Bounds::new(1E-5, 1E5).is_ok());
        assert_eq!(
            Bounds::new(2.0, 1.0),
            Err(KernelError::InvalidBounds(2.0, 1.0))
        );
        assert!(Bounds::new(0.0, 1.0).is_err());
        assert!(Bounds::new(1.0, f64::INFINITY).is_err());
        assert!(Bounds::fixed().ln_bounds().is_none());

        let (lower, upper) = Bounds::new(1E-2, 1E3).unwrap().ln_bounds().unwrap();
        assert::close(lower, 1E-2_f64.ln(), 1E-12);
        assert::close(upper, 1E3_f64.ln(), 1E-12);
        assert_eq!(Bounds::default().to_string(), "(1e-05, 1e+05)");
    }

    #[test]
    fn kernel_sugar_matches_operators() {
        let a = ConstantKernel::new(2.0).unwrap();
        let b = RBFKernel::new(0.5).unwrap();
        assert_eq!(Kernel::mul(a.clone(), b.clone()), a * b);

        let a = RBFKernel::new(0.5).unwrap();
        let b = WhiteKernel::new(0.1).unwrap();
        assert_eq!(Kernel::add(a.clone(), b.clone()), a + b);
    }

    #[test]
    fn parameter_index_skips_fixed() {
        let kernel = ConstantKernel::new(1.0).unwrap().with_bounds(Bounds::Fixed)
            * RBFKernel::new(1.0).unwrap()
            + WhiteKernel::new(1.0).unwrap();

        assert_eq!(kernel.n_parameters(), 2);
        assert_eq!(kernel.parameter_index("k1__k2__length_scale"), Ok(0));
        assert_eq!(kernel.parameter_index("k2__noise_level"), Ok(1));
        assert_eq!(
            kernel.parameter_index("k1__k1__constant_value"),
            Err(KernelError::UnknownParameter(
                "k1__k1__constant_value".to_string()
            ))
        );
    }

    #[test]
    fn clip_parameters_uses_bounds() {
        let kernel = RBFKernel::new(1.0)
            .unwrap()
            .with_bounds(Bounds::new(1E-2, 1E3).unwrap());
        let clipped = kernel.clip_parameters(&DVector::from_column_slice(&[10.0]));
        assert::close(clipped[0], 1E3_f64.ln(), 1E-12);
        let clipped = kernel.clip_parameters(&DVector::from_column_slice(&[0.5]));
        assert::close(clipped[0], 0.5, 1E-12);
    }
}

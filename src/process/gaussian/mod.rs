//! Gaussian Processes
//!
//! Regression with a Gaussian process prior whose covariance is given by a
//! [`Kernel`]. The kernel hyperparameters are fit by maximizing the log
//! marginal likelihood with a bounded quasi-Newton optimizer.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::HALF_LN_2PI;

pub mod kernel;
use kernel::{CovGradError, Kernel, KernelError};

mod lml_surface;
pub use lml_surface::*;

mod noise_model;
pub use noise_model::*;

mod optimize;
pub use optimize::*;

mod prediction;
pub use prediction::*;

pub use optim::{ArmijoParams, LbfgsParams, OptimizeError, Status};

use super::{RandomProcess, RandomProcessMle};

/// Errors from fitting and evaluating a Gaussian process
#[derive(Debug, Clone, PartialEq)]
pub enum GaussianProcessError {
    /// The kernel could not be built or differentiated
    Kernel(KernelError),
    /// `K + noise` is not positive definite; holds the kernel's description
    NotPositiveDefinite(String),
    /// No training points were given
    EmptyTrainingSet,
    /// Two inputs disagree in size
    DimensionMismatch {
        /// Size implied by the training data
        expected: usize,
        /// Size given
        given: usize,
    },
    /// Training inputs or targets contain NaN or infinite values
    NonFiniteData,
    /// The noise model holds negative or non-finite values
    InvalidNoise(String),
    /// The hyperparameter optimizer failed
    Optimization(OptimizeError),
    /// An LML surface axis cannot be swept
    InvalidAxis(String),
}

impl std::error::Error for GaussianProcessError {}

impl std::fmt::Display for GaussianProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kernel(e) => write!(f, "Kernel error: {e}"),
            Self::NotPositiveDefinite(kernel) => write!(
                f,
                "The kernel, {kernel}, is not returning a positive definite \
                 matrix. Try gradually increasing the noise of the NoiseModel."
            ),
            Self::EmptyTrainingSet => {
                write!(f, "Cannot train on an empty training set")
            }
            Self::DimensionMismatch { expected, given } => {
                write!(f, "Dimension mismatch: expected {expected}, given {given}")
            }
            Self::NonFiniteData => {
                write!(f, "Training data must only contain finite values")
            }
            Self::InvalidNoise(msg) => write!(f, "Invalid noise: {msg}"),
            Self::Optimization(e) => write!(f, "Optimization Failed: {e}"),
            Self::InvalidAxis(msg) => write!(f, "Invalid surface axis: {msg}"),
        }
    }
}

impl From<KernelError> for GaussianProcessError {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

impl From<CovGradError> for GaussianProcessError {
    fn from(e: CovGradError) -> Self {
        Self::Kernel(e.into())
    }
}

impl From<OptimizeError> for GaussianProcessError {
    fn from(e: OptimizeError) -> Self {
        Self::Optimization(e)
    }
}

/// Parameters for running GaussianProcess
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianProcessParams {
    /// Type of noise
    noise_model: NoiseModel,
    /// Standardize the targets before conditioning
    normalize_y: bool,
    /// Optimization parameters, `None` keeps the kernel as given
    optimizer: Option<LbfgsParams>,
    /// Number of extra optimizer runs from random starting points
    n_restarts: usize,
    /// Seed of the generator drawing restart points
    seed: u64,
}

impl GaussianProcessParams {
    #[must_use]
    pub fn with_noise_model(self, noise_model: NoiseModel) -> Self {
        Self {
            noise_model,
            ..self
        }
    }

    #[must_use]
    pub fn with_normalize_y(self, normalize_y: bool) -> Self {
        Self {
            normalize_y,
            ..self
        }
    }

    #[must_use]
    pub fn with_optimizer(self, lbfgs_params: LbfgsParams) -> Self {
        Self {
            optimizer: Some(lbfgs_params),
            ..self
        }
    }

    /// Do not optimize the hyperparameters in `fit`
    #[must_use]
    pub fn without_optimizer(self) -> Self {
        Self {
            optimizer: None,
            ..self
        }
    }

    #[must_use]
    pub fn with_n_restarts(self, n_restarts: usize) -> Self {
        Self { n_restarts, ..self }
    }

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    #[must_use]
    pub fn noise_model(&self) -> &NoiseModel {
        &self.noise_model
    }

    #[must_use]
    pub fn normalize_y(&self) -> bool {
        self.normalize_y
    }

    #[must_use]
    pub fn optimizer(&self) -> Option<&LbfgsParams> {
        self.optimizer.as_ref()
    }

    #[must_use]
    pub fn n_restarts(&self) -> usize {
        self.n_restarts
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for GaussianProcessParams {
    fn default() -> Self {
        Self {
            noise_model: NoiseModel::default(),
            normalize_y: false,
            optimizer: Some(LbfgsParams::default()),
            n_restarts: 0,
            seed: 0,
        }
    }
}

/// Factorization of `K + noise` for one set of hyperparameters
struct Conditioned {
    l: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    ln_m: f64,
}

fn condition<K: Kernel>(
    kernel: &K,
    cov: DMatrix<f64>,
    y: &DVector<f64>,
    noise_model: &NoiseModel,
) -> Result<Conditioned, GaussianProcessError> {
    let k = noise_model.add_noise_to_kernel(cov)?;

    // Decompose K into Cholesky lower lower triangular matrix
    let l = Cholesky::new(k).ok_or_else(|| {
        GaussianProcessError::NotPositiveDefinite(kernel.to_string())
    })?;
    let alpha = l.solve(y);

    // GPML Equation 2.30
    let dlog_sum: f64 = l.l_dirty().diagonal().map(f64::ln).sum();
    let n = y.len() as f64;
    let ln_m = (-0.5_f64).mul_add(y.dot(&alpha), -dlog_sum) - n * HALF_LN_2PI;

    Ok(Conditioned { l, alpha, ln_m })
}

/// Mean and population standard deviation; a zero deviation becomes one.
fn standardization(y: &DVector<f64>) -> (f64, f64) {
    let mean = y.mean();
    let std = y.variance().sqrt();
    if std < 10.0 * f64::EPSILON {
        (mean, 1.0)
    } else {
        (mean, std)
    }
}

/// A Gaussian process conditioned on training data
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde1",
    serde(
        try_from = "GaussianProcessState<K>",
        into = "GaussianProcessState<K>",
        bound(
            serialize = "K: Kernel + Serialize",
            deserialize = "K: Kernel + Deserialize<'de>"
        )
    )
)]
pub struct GaussianProcess<K>
where
    K: Kernel,
{
    /// Cholesky Decomposition of K
    l: Cholesky<f64, Dyn>,
    /// Dual coefficients of training data in kernel space.
    alpha: DVector<f64>,
    /// Covariance Kernel
    kernel: K,
    /// x values used in training
    x_train: DMatrix<f64>,
    /// y values used in training, as given
    y_train: DVector<f64>,
    /// y values after standardization
    y_fit: DVector<f64>,
    y_mean: f64,
    y_std: f64,
    /// Log marginal likelihood at the kernel's parameters
    ln_m: f64,
    /// Given parameters
    params: GaussianProcessParams,
    /// Outcome of the last optimization
    report: Option<OptimizationReport>,
}

impl<K> GaussianProcess<K>
where
    K: Kernel,
{
    /// Train a Gaussian Process on the given data points
    ///
    /// The kernel is used as given; see [`GaussianProcess::fit`] to also
    /// optimize its hyperparameters.
    ///
    /// # Arguments
    /// * `kernel` - Kernel to use to determine covariance
    /// * `x_train` - Values to use for input into `f`, one point per row
    /// * `y_train` - Known values for `f(x)`
    /// * `params` - GaussianProcessParams to use. Can just use `GaussianProcessParams::default()`.
    pub fn train(
        kernel: K,
        x_train: DMatrix<f64>,
        y_train: DVector<f64>,
        params: GaussianProcessParams,
    ) -> Result<Self, GaussianProcessError> {
        if x_train.nrows() == 0 {
            return Err(GaussianProcessError::EmptyTrainingSet);
        }
        if x_train.nrows() != y_train.len() {
            return Err(GaussianProcessError::DimensionMismatch {
                expected: x_train.nrows(),
                given: y_train.len(),
            });
        }
        if x_train.iter().chain(y_train.iter()).any(|v| !v.is_finite()) {
            return Err(GaussianProcessError::NonFiniteData);
        }
        params.noise_model.validate()?;

        let (y_mean, y_std) = if params.normalize_y {
            standardization(&y_train)
        } else {
            (0.0, 1.0)
        };
        let y_fit = y_train.map(|y| (y - y_mean) / y_std);

        let Conditioned { l, alpha, ln_m } = condition(
            &kernel,
            kernel.self_covariance(&x_train),
            &y_fit,
            &params.noise_model,
        )?;

        Ok(GaussianProcess {
            l,
            alpha,
            kernel,
            x_train,
            y_train,
            y_fit,
            y_mean,
            y_std,
            ln_m,
            params,
            report: None,
        })
    }

    /// Train and then optimize the kernel hyperparameters with the optimizer
    /// configured in `params`.
    pub fn fit(
        kernel: K,
        x_train: DMatrix<f64>,
        y_train: DVector<f64>,
        params: GaussianProcessParams,
    ) -> Result<Self, GaussianProcessError> {
        Self::train(kernel, x_train, y_train, params)?.optimize()
    }

    /// Return the Cholesky decomposition of K
    pub fn l(&self) -> &Cholesky<f64, Dyn> {
        &(self.l)
    }

    /// Dual coefficients `K^-1 y`
    pub fn alpha(&self) -> &DVector<f64> {
        &self.alpha
    }

    /// Return the kernel being used in this GP
    pub fn kernel(&self) -> &K {
        &(self.kernel)
    }

    pub fn x_train(&self) -> &DMatrix<f64> {
        &self.x_train
    }

    pub fn y_train(&self) -> &DVector<f64> {
        &self.y_train
    }

    pub fn params(&self) -> &GaussianProcessParams {
        &self.params
    }

    /// Per-run results of the last call to `optimize`, if any
    pub fn optimization_report(&self) -> Option<&OptimizationReport> {
        self.report.as_ref()
    }

    /// Return the log marginal likelihood at the kernel's parameters
    pub fn ln_m(&self) -> f64 {
        self.ln_m
    }

    /// Log marginal likelihood with the kernel's log-scale parameters set to
    /// `theta`.
    ///
    /// `theta` may lie outside of the kernel's bounds. The model itself is
    /// left untouched.
    pub fn ln_m_at(
        &self,
        theta: &DVector<f64>,
    ) -> Result<f64, GaussianProcessError> {
        let kernel = self.kernel.reparameterize(theta.as_slice())?;
        let cov = kernel.self_covariance(&self.x_train);
        condition(&kernel, cov, &self.y_fit, &self.params.noise_model)
            .map(|c| c.ln_m)
    }

    /// Log-marginal likelihood and its gradient with respect to the
    /// log-scale parameters `theta`
    pub fn ln_m_with_parameters(
        &self,
        theta: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>), GaussianProcessError> {
        let kernel = self.kernel.reparameterize(theta.as_slice())?;

        let (k, k_grad) = kernel.covariance_with_gradient(&self.x_train)?;
        let c = condition(&kernel, k, &self.y_fit, &self.params.noise_model)?;

        // GPML Equation 5.9
        let aat_kinv = &c.alpha * c.alpha.transpose() - c.l.inverse();
        let grad_ln_m = DVector::from_iterator(
            k_grad.n_parameters(),
            k_grad.iter().map(|dk| 0.5 * aat_kinv.component_mul(dk).sum()),
        );
        Ok((c.ln_m, grad_ln_m))
    }

    /// Return a `GaussianProcessPrediction` to preform prediction on.
    pub fn predict<'a>(
        &'a self,
        xs: &'a DMatrix<f64>,
    ) -> Result<GaussianProcessPrediction<'a, K>, GaussianProcessError> {
        GaussianProcessPrediction::new(self, xs)
    }
}

impl<K> RandomProcess for GaussianProcess<K>
where
    K: Kernel,
{
    type Parameter = DVector<f64>;
    type Error = GaussianProcessError;

    fn ln_m(&self) -> f64 {
        self.ln_m
    }

    fn ln_m_with_parameters(
        &self,
        parameter: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>), GaussianProcessError> {
        GaussianProcess::ln_m_with_parameters(self, parameter)
    }

    fn parameters(&self) -> DVector<f64> {
        self.kernel.parameters()
    }

    fn set_parameters(
        self,
        parameters: &DVector<f64>,
    ) -> Result<Self, GaussianProcessError> {
        let kernel = self.kernel.reparameterize(parameters.as_slice())?;
        Self::train(kernel, self.x_train, self.y_train, self.params)
    }
}

impl<K> RandomProcessMle for GaussianProcess<K>
where
    K: Kernel,
{
    fn optimize(self) -> Result<Self, GaussianProcessError> {
        GaussianProcess::optimize(self)
    }
}

/// Serialized form of a [`GaussianProcess`].
///
/// The factorization is recomputed when deserializing.
#[cfg(feature = "serde1")]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GaussianProcessState<K> {
    pub kernel: K,
    pub x_train: DMatrix<f64>,
    pub y_train: DVector<f64>,
    pub params: GaussianProcessParams,
}

#[cfg(feature = "serde1")]
impl<K: Kernel> From<GaussianProcess<K>> for GaussianProcessState<K> {
    fn from(gp: GaussianProcess<K>) -> Self {
        Self {
            kernel: gp.kernel,
            x_train: gp.x_train,
            y_train: gp.y_train,
            params: gp.params,
        }
    }
}

#[cfg(feature = "serde1")]
impl<K: Kernel> TryFrom<GaussianProcessState<K>> for GaussianProcess<K> {
    type Error = GaussianProcessError;

    fn try_from(state: GaussianProcessState<K>) -> Result<Self, Self::Error> {
        Self::train(state.kernel, state.x_train, state.y_train, state.params)
    }
}

use log::{debug, warn};
use nalgebra::DVector;
use optim::{lbfgsb, OptimizeError, Status};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::kernel::Kernel;
use super::{GaussianProcess, GaussianProcessError};

const BOUND_RTOL: f64 = 1E-5;
const BOUND_ATOL: f64 = 1E-8;

/// Outcome of one optimizer run
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OptimizationRun {
    /// Log-scale parameters the run started from
    pub initial_theta: DVector<f64>,
    /// Log-scale parameters the run ended at
    pub theta: DVector<f64>,
    /// Log marginal likelihood at `theta`
    pub ln_m: f64,
    pub n_iter: usize,
    pub n_eval: usize,
    pub status: Status,
}

/// Side of a search range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum BoundSide {
    Lower,
    Upper,
}

impl std::fmt::Display for BoundSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lower => write!(f, "lower"),
            Self::Upper => write!(f, "upper"),
        }
    }
}

/// An optimized hyperparameter that ended up at its search bound
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct BoundProximity {
    pub name: String,
    /// Value on the natural scale
    pub value: f64,
    pub side: BoundSide,
    /// The bound on the natural scale
    pub bound: f64,
}

impl std::fmt::Display for BoundProximity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let advice = match self.side {
            BoundSide::Lower => "Decreasing the bound",
            BoundSide::Upper => "Increasing the bound",
        };
        write!(
            f,
            "The optimal value found for parameter {} is close to the \
             specified {} bound {:e}. {} and calling fit again may find a \
             better value.",
            self.name, self.side, self.bound, advice
        )
    }
}

/// Results of every optimizer run of a fit
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OptimizationReport {
    runs: Vec<OptimizationRun>,
    best: usize,
    near_bounds: Vec<BoundProximity>,
}

impl OptimizationReport {
    /// Every successful run, the first one starting from the given kernel
    pub fn runs(&self) -> &[OptimizationRun] {
        &self.runs
    }

    /// The run with the highest log marginal likelihood
    pub fn best_run(&self) -> &OptimizationRun {
        &self.runs[self.best]
    }

    /// Hyperparameters of the chosen kernel that sit on a search bound
    pub fn near_bounds(&self) -> &[BoundProximity] {
        &self.near_bounds
    }
}

/// Check the free hyperparameters of `kernel` against their bounds
fn bound_proximity<K: Kernel>(kernel: &K) -> Vec<BoundProximity> {
    let theta = kernel.parameters();
    let close = |t: f64, b: f64| (t - b).abs() <= BOUND_RTOL.mul_add(b.abs(), BOUND_ATOL);

    kernel
        .hyperparameters()
        .into_iter()
        .filter(|hp| !hp.bounds.is_fixed())
        .zip(theta.iter().zip(kernel.parameter_bounds()))
        .filter_map(|(hp, (&t, (lower, upper)))| {
            let side = if close(t, lower) {
                Some((BoundSide::Lower, lower))
            } else if close(t, upper) {
                Some((BoundSide::Upper, upper))
            } else {
                None
            };
            side.map(|(side, bound)| BoundProximity {
                name: hp.name,
                value: hp.value,
                side,
                bound: bound.exp(),
            })
        })
        .collect()
}

impl<K> GaussianProcess<K>
where
    K: Kernel,
{
    /// Maximize the log marginal likelihood over the kernel's free
    /// hyperparameters.
    ///
    /// The first run starts at the kernel's current parameters, each of the
    /// `n_restarts` further runs at a point drawn uniformly within the log
    /// bounds. The model is retrained with the best parameters found. Without
    /// an optimizer or free hyperparameters the model is returned as is.
    pub fn optimize(self) -> Result<Self, GaussianProcessError> {
        let Some(lbfgs_params) = self.params.optimizer().cloned() else {
            return Ok(self);
        };
        if self.kernel.n_parameters() == 0 {
            return Ok(self);
        }

        let bounds = self.kernel.parameter_bounds();
        let n = bounds.len();

        let objective = |theta: &DVector<f64>| -> (f64, DVector<f64>) {
            match self.ln_m_with_parameters(theta) {
                Ok((ln_m, grad)) => (-ln_m, -grad),
                Err(_) => (f64::INFINITY, DVector::zeros(n)),
            }
        };

        let mut rng = Xoshiro256Plus::seed_from_u64(self.params.seed());
        let initial = self.kernel.clip_parameters(&self.kernel.parameters());
        let starts: Vec<DVector<f64>> = std::iter::once(initial)
            .chain((0..self.params.n_restarts()).map(|_| {
                DVector::from_iterator(
                    n,
                    bounds.iter().map(|&(lower, upper)| rng.gen_range(lower..upper)),
                )
            }))
            .collect();

        let mut runs: Vec<OptimizationRun> = Vec::with_capacity(starts.len());
        for (i, initial_theta) in starts.into_iter().enumerate() {
            match lbfgsb(initial_theta.clone(), &bounds, &lbfgs_params, &objective)
            {
                Ok(min) => {
                    if !min.status.is_converged() {
                        warn!("lbfgsb run {} did not converge: {}", i, min.status);
                    }
                    debug!(
                        "lbfgsb run {}: ln_m = {} after {} iterations",
                        i, -min.f, min.n_iter
                    );
                    runs.push(OptimizationRun {
                        initial_theta,
                        theta: min.x,
                        ln_m: -min.f,
                        n_iter: min.n_iter,
                        n_eval: min.n_eval,
                        status: min.status,
                    });
                }
                Err(e) => {
                    warn!("lbfgsb run {} from {} failed: {}", i, initial_theta, e);
                }
            }
        }

        let best = runs
            .iter()
            .enumerate()
            .filter(|(_, run)| run.ln_m.is_finite())
            .max_by(|(_, a), (_, b)| a.ln_m.total_cmp(&b.ln_m))
            .map(|(i, _)| i)
            .ok_or(OptimizeError::NumericalDivergence)?;

        let kernel = self.kernel.reparameterize(runs[best].theta.as_slice())?;
        let near_bounds = bound_proximity(&kernel);
        for proximity in &near_bounds {
            warn!("{}", proximity);
        }

        let mut gp = Self::train(kernel, self.x_train, self.y_train, self.params)?;
        gp.report = Some(OptimizationReport {
            runs,
            best,
            near_bounds,
        });
        Ok(gp)
    }
}

//! Limited-memory BFGS on a box
//!
//! A projected variant of L-BFGS: the quasi-Newton direction is computed with
//! the two-loop recursion over the variables that are free to move, and steps
//! are clipped onto the box by a backtracking line search. Every iterate is
//! feasible.

use std::collections::VecDeque;

use log::debug;
use nalgebra::DVector;

use crate::bounds::{check_bounds, free_variables, project, projected_gradient};
use crate::line_search::{projected_armijo, ArmijoParams};
use crate::OptimizeError;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Parameters for the L-BFGS-B Optimizer
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct LbfgsParams {
    /// Number of correction pairs kept for the inverse Hessian estimate
    pub memory: usize,
    /// Maximum number of iterations to run
    pub max_iter: usize,
    /// Maximum number of objective evaluations
    pub max_eval: usize,
    /// Stop once the projected gradient's largest entry is below this
    pub pgtol: f64,
    /// Stop once the relative decrease of the objective is below this
    pub ftol: f64,
    /// Parameters given to the line search
    pub armijo_params: ArmijoParams,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            memory: 10,
            max_iter: 15_000,
            max_eval: 15_000,
            pgtol: 1E-5,
            ftol: 1E7 * f64::EPSILON,
            armijo_params: ArmijoParams::default(),
        }
    }
}

impl LbfgsParams {
    #[must_use]
    pub fn with_memory(self, memory: usize) -> Self {
        Self { memory, ..self }
    }

    #[must_use]
    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }

    #[must_use]
    pub fn with_max_eval(self, max_eval: usize) -> Self {
        Self { max_eval, ..self }
    }

    #[must_use]
    pub fn with_pgtol(self, pgtol: f64) -> Self {
        Self { pgtol, ..self }
    }

    #[must_use]
    pub fn with_ftol(self, ftol: f64) -> Self {
        Self { ftol, ..self }
    }

    #[must_use]
    pub fn with_armijo_params(self, armijo_params: ArmijoParams) -> Self {
        Self {
            armijo_params,
            ..self
        }
    }
}

/// Reason the optimizer stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum Status {
    /// The projected gradient is below `pgtol`
    GradientConverged,
    /// The relative decrease of the objective is below `ftol`
    CostConverged,
    /// `max_iter` iterations were run
    MaxIterationReached,
    /// `max_eval` evaluations were spent
    MaxEvaluationReached,
    /// The line search could not make progress
    LineSearchFailed,
}

impl Status {
    /// Whether a convergence criterion was met
    #[must_use]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::GradientConverged | Self::CostConverged)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::GradientConverged => "converged: projected gradient <= pgtol",
            Self::CostConverged => "converged: relative reduction <= ftol",
            Self::MaxIterationReached => "stopped: iteration limit reached",
            Self::MaxEvaluationReached => "stopped: evaluation limit reached",
            Self::LineSearchFailed => "stopped: abnormal termination in line search",
        };
        write!(f, "{msg}")
    }
}

/// Result of a minimization
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Minimum {
    /// Best point found
    pub x: DVector<f64>,
    /// Objective at `x`
    pub f: f64,
    /// Gradient at `x`
    pub grad: DVector<f64>,
    /// Number of iterations run
    pub n_iter: usize,
    /// Number of objective evaluations
    pub n_eval: usize,
    /// Why the optimizer stopped
    pub status: Status,
}

struct Correction {
    s: DVector<f64>,
    y: DVector<f64>,
    rho: f64,
}

/// Two-loop recursion: returns `H g` for the inverse Hessian estimate `H`.
fn two_loop(history: &VecDeque<Correction>, g: &DVector<f64>) -> DVector<f64> {
    let mut q = g.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for c in history.iter().rev() {
        let a = c.rho * c.s.dot(&q);
        q.axpy(-a, &c.y, 1.0);
        alphas.push(a);
    }

    let gamma = history
        .back()
        .map_or(1.0, |c| c.s.dot(&c.y) / c.y.norm_squared());
    let mut r = q * gamma;

    for (c, a) in history.iter().zip(alphas.iter().rev()) {
        let b = c.rho * c.y.dot(&r);
        r.axpy(a - b, &c.s, 1.0);
    }
    r
}

/// Zero the components of `d` that are held or would leave the box.
fn mask_direction(
    d: &mut DVector<f64>,
    x: &DVector<f64>,
    free: &[bool],
    bounds: &[(f64, f64)],
) {
    d.iter_mut()
        .zip(x.iter())
        .zip(free.iter().zip(bounds.iter()))
        .for_each(|((di, &xi), (&is_free, &(lower, upper)))| {
            if !is_free || (xi <= lower && *di < 0.0) || (xi >= upper && *di > 0.0)
            {
                *di = 0.0;
            }
        });
}

fn finish(
    x: DVector<f64>,
    f: f64,
    grad: DVector<f64>,
    n_iter: usize,
    n_eval: usize,
    status: Status,
) -> Result<Minimum, OptimizeError> {
    debug!("lbfgsb: {} after {} iterations", status, n_iter);
    Ok(Minimum {
        x,
        f,
        grad,
        n_iter,
        n_eval,
        status,
    })
}

/// Minimize `f` over the box `bounds`.
///
/// `f` returns the objective and its gradient. Infinite or NaN objective
/// values are treated as infeasible: the line search backtracks away from
/// them. `x0` is clipped onto the box before the first evaluation.
///
/// Running out of iterations or evaluations and line search failure are not
/// errors; they are reported in [`Minimum::status`] together with the best
/// point found.
pub fn lbfgsb<F>(
    x0: DVector<f64>,
    bounds: &[(f64, f64)],
    params: &LbfgsParams,
    f: F,
) -> Result<Minimum, OptimizeError>
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    check_bounds(x0.len(), bounds)?;

    let mut x = project(&x0, bounds);
    let (mut fx, mut g) = f(&x);
    let mut n_eval = 1;

    if !fx.is_finite() || g.iter().any(|gi| !gi.is_finite()) {
        return Err(OptimizeError::NumericalDivergence);
    }

    let mut history: VecDeque<Correction> =
        VecDeque::with_capacity(params.memory);

    for i in 0..params.max_iter {
        let pg = projected_gradient(&x, &g, bounds);
        if pg.amax() <= params.pgtol {
            return finish(x, fx, g, i, n_eval, Status::GradientConverged);
        }

        let free = free_variables(&x, &g, bounds);
        let mut g_free = g.clone();
        g_free
            .iter_mut()
            .zip(free.iter())
            .filter(|(_, is_free)| !**is_free)
            .for_each(|(gi, _)| *gi = 0.0);

        let mut d = -two_loop(&history, &g_free);
        mask_direction(&mut d, &x, &free, bounds);

        if d.iter().any(|di| !di.is_finite()) || d.dot(&g) >= 0.0 {
            debug!("lbfgsb: i = {}, falling back to steepest descent", i);
            d = -g_free;
            mask_direction(&mut d, &x, &free, bounds);
        }

        let initial_step = if history.is_empty() {
            (1.0 / d.norm()).min(1.0)
        } else {
            1.0
        };

        debug!("lbfgsb: i = {}, f = {}, x = {}, d = {}", i, fx, x, d);

        let step = match projected_armijo(
            &x,
            fx,
            &g,
            &d,
            initial_step,
            bounds,
            &params.armijo_params,
            &mut n_eval,
            params.max_eval,
            &f,
        ) {
            Ok(step) => step,
            Err(OptimizeError::MaxEvaluationReached) => {
                return finish(x, fx, g, i, n_eval, Status::MaxEvaluationReached)
            }
            Err(_) => {
                return finish(x, fx, g, i, n_eval, Status::LineSearchFailed)
            }
        };

        let s = &step.x - &x;
        let y = &step.grad - &g;
        let rel_reduction = (fx - step.f) / fx.abs().max(step.f.abs()).max(1.0);

        x = step.x;
        fx = step.f;
        g = step.grad;

        let sy = s.dot(&y);
        if sy > f64::EPSILON * y.norm_squared() {
            if history.len() == params.memory {
                history.pop_front();
            }
            if params.memory > 0 {
                history.push_back(Correction { s, y, rho: 1.0 / sy });
            }
        }

        if rel_reduction <= params.ftol {
            return finish(x, fx, g, i + 1, n_eval, Status::CostConverged);
        }
    }

    finish(
        x,
        fx,
        g,
        params.max_iter,
        n_eval,
        Status::MaxIterationReached,
    )
}

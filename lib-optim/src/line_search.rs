//! Line search methods

use crate::bounds::project;
use crate::OptimizeError;
use log::debug;
use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Backtracking (Armijo) line search parameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct ArmijoParams {
    /// Sufficient decrease coefficient
    pub c1: f64,
    /// Factor the step is multiplied by after a rejected trial
    pub shrink: f64,
    /// Maximum number of trial steps
    pub max_iter: usize,
}

impl Default for ArmijoParams {
    fn default() -> Self {
        Self {
            c1: 1E-4,
            shrink: 0.5,
            max_iter: 20,
        }
    }
}

impl ArmijoParams {
    #[must_use]
    pub fn with_c1(self, c1: f64) -> Self {
        Self { c1, ..self }
    }

    #[must_use]
    pub fn with_shrink(self, shrink: f64) -> Self {
        Self { shrink, ..self }
    }

    #[must_use]
    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }
}

/// An accepted point of a line search
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// New iterate
    pub x: DVector<f64>,
    /// Objective at `x`
    pub f: f64,
    /// Gradient at `x`
    pub grad: DVector<f64>,
}

/// Projected backtracking line search.
///
/// Trial points are `P(x + t d)` for `t = t0, t0 * shrink, ...` where `P`
/// clips onto the box. A trial is accepted when the objective is finite and
///
/// ```math
///     f(x_t) \le f(x) + c_1 \nabla f(x)^T (x_t - x)
/// ```
///
/// Every evaluation increments `n_eval`; the search stops with
/// `MaxEvaluationReached` once `n_eval` hits `max_eval`.
#[allow(clippy::too_many_arguments)]
pub fn projected_armijo<F>(
    x: &DVector<f64>,
    fx: f64,
    grad: &DVector<f64>,
    direction: &DVector<f64>,
    initial_step: f64,
    bounds: &[(f64, f64)],
    params: &ArmijoParams,
    n_eval: &mut usize,
    max_eval: usize,
    f: F,
) -> Result<Step, OptimizeError>
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    let mut t = initial_step;

    for i in 0..params.max_iter {
        let x_t = project(&(x + direction * t), bounds);
        let s = &x_t - x;
        let slope = grad.dot(&s);
        debug!(
            "projected_armijo: i = {}, t = {:e}, slope = {:e}",
            i, t, slope
        );

        // Projection can bend the step away from descent when it is long
        if slope < 0.0 {
            if *n_eval >= max_eval {
                return Err(OptimizeError::MaxEvaluationReached);
            }
            let (f_t, grad_t) = f(&x_t);
            *n_eval += 1;

            if f_t.is_finite() && f_t <= params.c1.mul_add(slope, fx) {
                return Ok(Step {
                    x: x_t,
                    f: f_t,
                    grad: grad_t,
                });
            }
        } else if s.iter().all(|si| *si == 0.0) {
            break;
        }

        t *= params.shrink;
    }

    Err(OptimizeError::LineSearchFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parabola(x: &DVector<f64>) -> (f64, DVector<f64>) {
        let y = (x[0] - 1.0).powi(2);
        (y, DVector::from_column_slice(&[2.0 * (x[0] - 1.0)]))
    }

    #[test]
    fn accepts_full_step_on_parabola() {
        let x = DVector::from_column_slice(&[0.0]);
        let (fx, g) = parabola(&x);
        let d = DVector::from_column_slice(&[1.0]);
        let mut n_eval = 0;
        let step = projected_armijo(
            &x,
            fx,
            &g,
            &d,
            1.0,
            &[(f64::NEG_INFINITY, f64::INFINITY)],
            &ArmijoParams::default(),
            &mut n_eval,
            100,
            parabola,
        )
        .expect("unit step reaches the minimum");

        assert::close(step.x[0], 1.0, 1E-12);
        assert::close(step.f, 0.0, 1E-12);
        assert_eq!(n_eval, 1);
    }

    #[test]
    fn backtracks_from_overshoot() {
        let x = DVector::from_column_slice(&[0.0]);
        let (fx, g) = parabola(&x);
        let d = DVector::from_column_slice(&[8.0]);
        let mut n_eval = 0;
        let step = projected_armijo(
            &x,
            fx,
            &g,
            &d,
            1.0,
            &[(f64::NEG_INFINITY, f64::INFINITY)],
            &ArmijoParams::default(),
            &mut n_eval,
            100,
            parabola,
        )
        .expect("halving finds a decrease");

        assert!(step.f < fx);
        assert!(n_eval > 1);
    }

    #[test]
    fn stays_inside_box() {
        let x = DVector::from_column_slice(&[0.0]);
        let (fx, g) = parabola(&x);
        let d = DVector::from_column_slice(&[4.0]);
        let mut n_eval = 0;
        let step = projected_armijo(
            &x,
            fx,
            &g,
            &d,
            1.0,
            &[(0.0, 0.25)],
            &ArmijoParams::default(),
            &mut n_eval,
            100,
            parabola,
        )
        .expect("clipped step still decreases");

        assert::close(step.x[0], 0.25, 1E-12);
    }

    #[test]
    fn respects_evaluation_budget() {
        let x = DVector::from_column_slice(&[0.0]);
        let (fx, g) = parabola(&x);
        let d = DVector::from_column_slice(&[1.0]);
        let mut n_eval = 3;
        let res = projected_armijo(
            &x,
            fx,
            &g,
            &d,
            1.0,
            &[(f64::NEG_INFINITY, f64::INFINITY)],
            &ArmijoParams::default(),
            &mut n_eval,
            3,
            parabola,
        );
        assert_eq!(res, Err(OptimizeError::MaxEvaluationReached));
    }

    #[test]
    fn fails_on_ascent_direction() {
        let x = DVector::from_column_slice(&[0.0]);
        let (fx, g) = parabola(&x);
        let d = DVector::from_column_slice(&[-1.0]);
        let mut n_eval = 0;
        let res = projected_armijo(
            &x,
            fx,
            &g,
            &d,
            1.0,
            &[(f64::NEG_INFINITY, f64::INFINITY)],
            &ArmijoParams::default(),
            &mut n_eval,
            100,
            parabola,
        );
        assert_eq!(res, Err(OptimizeError::LineSearchFailed));
        assert_eq!(n_eval, 0);
    }
}

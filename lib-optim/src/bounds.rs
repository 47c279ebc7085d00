//! Helpers for working inside a box `lower <= x <= upper`

use nalgebra::DVector;

use crate::OptimizeError;

/// Check that `bounds` describes a box of dimension `n`.
///
/// Infinite bounds are allowed and leave that side unconstrained.
pub fn check_bounds(
    n: usize,
    bounds: &[(f64, f64)],
) -> Result<(), OptimizeError> {
    if bounds.len() != n {
        return Err(OptimizeError::DimensionMismatch {
            expected: bounds.len(),
            given: n,
        });
    }

    bounds
        .iter()
        .enumerate()
        .try_for_each(|(index, &(lower, upper))| {
            if lower.is_nan() || upper.is_nan() || lower > upper {
                Err(OptimizeError::InvalidBounds {
                    index,
                    lower,
                    upper,
                })
            } else {
                Ok(())
            }
        })
}

/// Clip `x` onto the box.
#[must_use]
pub fn project(x: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter()
            .zip(bounds.iter())
            .map(|(&xi, &(lower, upper))| xi.clamp(lower, upper)),
    )
}

/// Projected gradient `P(x - g) - x`.
///
/// Its infinity norm is zero exactly at the first-order critical points of
/// the constrained problem.
#[must_use]
pub fn projected_gradient(
    x: &DVector<f64>,
    grad: &DVector<f64>,
    bounds: &[(f64, f64)],
) -> DVector<f64> {
    project(&(x - grad), bounds) - x
}

/// Variables that may move along `-grad`.
///
/// A variable is held when it sits on a bound and the gradient pushes it
/// outward.
#[must_use]
pub fn free_variables(
    x: &DVector<f64>,
    grad: &DVector<f64>,
    bounds: &[(f64, f64)],
) -> Vec<bool> {
    x.iter()
        .zip(grad.iter())
        .zip(bounds.iter())
        .map(|((&xi, &gi), &(lower, upper))| {
            !((xi <= lower && gi > 0.0) || (xi >= upper && gi < 0.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_clips_each_coordinate() {
        let x = DVector::from_column_slice(&[-3.0, 0.5, 7.0]);
        let bounds = [(-1.0, 1.0), (0.0, 1.0), (f64::NEG_INFINITY, 5.0)];
        let p = project(&x, &bounds);
        assert_eq!(p, DVector::from_column_slice(&[-1.0, 0.5, 5.0]));
    }

    #[test]
    fn projected_gradient_vanishes_on_active_bound() {
        let x = DVector::from_column_slice(&[0.0, 0.5]);
        let g = DVector::from_column_slice(&[2.0, 0.0]);
        let bounds = [(0.0, 1.0), (0.0, 1.0)];
        let pg = projected_gradient(&x, &g, &bounds);
        assert_eq!(pg, DVector::zeros(2));
        assert_eq!(free_variables(&x, &g, &bounds), vec![false, true]);
    }

    #[test]
    fn check_bounds_rejects_bad_boxes() {
        assert_eq!(
            check_bounds(1, &[(1.0, 0.0)]),
            Err(OptimizeError::InvalidBounds {
                index: 0,
                lower: 1.0,
                upper: 0.0
            })
        );
        assert_eq!(
            check_bounds(2, &[(0.0, 1.0)]),
            Err(OptimizeError::DimensionMismatch {
                expected: 1,
                given: 2
            })
        );
        assert!(check_bounds(1, &[(f64::NEG_INFINITY, f64::INFINITY)]).is_ok());
        assert!(check_bounds(1, &[(f64::NAN, 1.0)]).is_err());
    }
}

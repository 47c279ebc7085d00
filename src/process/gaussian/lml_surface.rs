use itertools::iproduct;
use nalgebra::{DMatrix, DVector};

use super::kernel::{Kernel, KernelError};
use super::{GaussianProcess, GaussianProcessError};

/// `n` values spaced evenly on a log scale from `10^start` to `10^stop`
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10_f64.powf(start)],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| 10_f64.powf(step.mul_add(i as f64, start)))
                .collect()
        }
    }
}

/// One swept hyperparameter
#[derive(Clone, Debug, PartialEq)]
pub struct Axis {
    /// Position in the kernel's log-scale parameter vector
    index: usize,
    /// Values to visit, on the natural scale
    values: Vec<f64>,
}

impl Axis {
    pub fn new(index: usize, values: Vec<f64>) -> Self {
        Self { index, values }
    }

    /// Axis over the free hyperparameter called `name`
    pub fn by_name<K: Kernel>(
        kernel: &K,
        name: &str,
        values: Vec<f64>,
    ) -> Result<Self, KernelError> {
        Ok(Self::new(kernel.parameter_index(name)?, values))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Log marginal likelihood over a 2-D grid of two hyperparameters with
/// the others held at `base`.
#[derive(Clone, Debug, PartialEq)]
pub struct LnMSurface {
    base: DVector<f64>,
    x_axis: Axis,
    y_axis: Axis,
}

impl LnMSurface {
    /// `base` is the log-scale parameter vector the axes are swept around.
    pub fn new(base: DVector<f64>, x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            base,
            x_axis,
            y_axis,
        }
    }

    /// Evaluate every grid point.
    ///
    /// Points where the covariance is not positive definite get `-inf`. The
    /// process itself is not changed.
    pub fn evaluate<K: Kernel>(
        &self,
        gp: &GaussianProcess<K>,
    ) -> Result<LnMGrid, GaussianProcessError> {
        let n = gp.kernel().n_parameters();
        if self.base.len() != n {
            return Err(GaussianProcessError::DimensionMismatch {
                expected: n,
                given: self.base.len(),
            });
        }
        for axis in [&self.x_axis, &self.y_axis] {
            if axis.index >= n {
                return Err(GaussianProcessError::DimensionMismatch {
                    expected: n,
                    given: axis.index + 1,
                });
            }
            if let Some(v) = axis.values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
                return Err(GaussianProcessError::InvalidAxis(format!(
                    "parameter {} cannot take the value {}",
                    axis.index, v
                )));
            }
        }
        if self.x_axis.index == self.y_axis.index {
            return Err(GaussianProcessError::InvalidAxis(format!(
                "both axes sweep parameter {}",
                self.x_axis.index
            )));
        }

        let nx = self.x_axis.values.len();
        let ny = self.y_axis.values.len();
        let mut values = DMatrix::zeros(ny, nx);
        let mut theta = self.base.clone();

        for ((j, &yv), (i, &xv)) in iproduct!(
            self.y_axis.values.iter().enumerate(),
            self.x_axis.values.iter().enumerate()
        ) {
            theta[self.x_axis.index] = xv.ln();
            theta[self.y_axis.index] = yv.ln();
            values[(j, i)] = match gp.ln_m_at(&theta) {
                Ok(ln_m) => ln_m,
                Err(GaussianProcessError::NotPositiveDefinite(_)) => {
                    f64::NEG_INFINITY
                }
                Err(e) => return Err(e),
            };
        }

        Ok(LnMGrid {
            x_values: self.x_axis.values.clone(),
            y_values: self.y_axis.values.clone(),
            values,
        })
    }
}

/// Grid of log marginal likelihoods; row `j`, column `i` holds the value at
/// `(x_values[i], y_values[j])`.
#[derive(Clone, Debug, PartialEq)]
pub struct LnMGrid {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub values: DMatrix<f64>,
}

impl LnMGrid {
    /// Location and value of the largest finite entry
    pub fn argmax(&self) -> Option<(f64, f64, f64)> {
        iproduct!(0..self.values.nrows(), 0..self.values.ncols())
            .map(|(j, i)| (j, i, self.values[(j, i)]))
            .filter(|(_, _, v)| v.is_finite())
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(j, i, v)| (self.x_values[i], self.y_values[j], v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::gaussian::kernel::{ConstantKernel, RBFKernel, WhiteKernel};
    use crate::process::gaussian::{GaussianProcessParams, NoiseModel};

    #[test]
    fn logspace_endpoints() {
        let v = logspace(-2.0, 4.0, 7);
        assert_eq!(v.len(), 7);
        assert::close(v[0], 0.01, 1E-14);
        assert::close(v[3], 10.0, 1E-12);
        assert::close(v[6], 1E4, 1E-9);
        assert!(logspace(0.0, 1.0, 0).is_empty());
        assert_eq!(logspace(1.0, 5.0, 1), vec![10.0]);
    }

    fn gp() -> GaussianProcess<impl Kernel> {
        let x = DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
        let y: DVector<f64> = x.map(|x: f64| x.sin()).column(0).into();
        let kernel = ConstantKernel::new(1.0).expect("valid")
            * RBFKernel::new(1.0).expect("valid")
            + WhiteKernel::new(0.1).expect("valid");
        GaussianProcess::train(kernel, x, y, GaussianProcessParams::default())
            .expect("positive definite")
    }

    #[test]
    fn grid_matches_pointwise_evaluation() -> Result<(), GaussianProcessError> {
        let gp = gp();
        let base = gp.kernel().parameters();
        let x_axis = Axis::by_name(gp.kernel(), "k1__k2__length_scale", logspace(-1.0, 1.0, 4))?;
        let y_axis = Axis::by_name(gp.kernel(), "k2__noise_level", logspace(-2.0, 0.0, 3))?;
        let grid = LnMSurface::new(base.clone(), x_axis, y_axis).evaluate(&gp)?;

        assert_eq!(grid.values.shape(), (3, 4));
        let mut theta = base;
        theta[1] = grid.x_values[2].ln();
        theta[2] = grid.y_values[1].ln();
        assert::close(grid.values[(1, 2)], gp.ln_m_at(&theta)?, 1E-12);

        let (xv, yv, best) = grid.argmax().expect("finite values");
        assert!(grid.values.iter().all(|&v| v <= best));
        assert!(grid.x_values.contains(&xv) && grid.y_values.contains(&yv));
        Ok(())
    }

    #[test]
    fn singular_points_are_negative_infinity() -> Result<(), GaussianProcessError>
    {
        // duplicate inputs with no noise at all are singular
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 0.0, 1.0]);
        let y = DVector::from_column_slice(&[0.0, 0.0, 1.0]);
        let kernel = RBFKernel::new(1.0)? + WhiteKernel::new(1.0)?;
        let gp = GaussianProcess::train(
            kernel,
            x,
            y,
            GaussianProcessParams::default()
                .with_noise_model(NoiseModel::Uniform(0.0)),
        )?;
        let surface = LnMSurface::new(
            gp.kernel().parameters(),
            Axis::new(0, vec![1.0]),
            Axis::new(1, vec![1.0, 1E-300]),
        );
        let grid = surface.evaluate(&gp)?;
        assert!(grid.values[(0, 0)].is_finite());
        assert_eq!(grid.values[(1, 0)], f64::NEG_INFINITY);
        Ok(())
    }

    #[test]
    fn rejects_bad_axes() {
        let gp = gp();
        let base = gp.kernel().parameters();
        let res = LnMSurface::new(
            base.clone(),
            Axis::new(0, vec![1.0]),
            Axis::new(3, vec![1.0]),
        )
        .evaluate(&gp);
        assert!(matches!(
            res,
            Err(GaussianProcessError::DimensionMismatch { expected: 3, given: 4 })
        ));
        let res = LnMSurface::new(
            base.rows(0, 2).into_owned(),
            Axis::new(0, vec![1.0]),
            Axis::new(1, vec![1.0]),
        )
        .evaluate(&gp);
        assert!(res.is_err());
        assert!(Axis::by_name(gp.kernel(), "length_scale", vec![1.0]).is_err());
    }

    #[test]
    fn rejects_axes_that_cannot_be_logged() {
        let gp = gp();
        let base = gp.kernel().parameters();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let res = LnMSurface::new(
                base.clone(),
                Axis::new(1, vec![1.0, bad]),
                Axis::new(2, vec![0.1]),
            )
            .evaluate(&gp);
            assert!(matches!(res, Err(GaussianProcessError::InvalidAxis(_))));

            let res = LnMSurface::new(
                base.clone(),
                Axis::new(1, vec![1.0]),
                Axis::new(2, vec![bad, 0.1]),
            )
            .evaluate(&gp);
            assert!(matches!(res, Err(GaussianProcessError::InvalidAxis(_))));
        }
    }

    #[test]
    fn rejects_the_same_parameter_on_both_axes() {
        let gp = gp();
        let res = LnMSurface::new(
            gp.kernel().parameters(),
            Axis::new(1, vec![0.5, 1.0]),
            Axis::new(1, vec![0.5, 1.0]),
        )
        .evaluate(&gp);
        assert!(matches!(res, Err(GaussianProcessError::InvalidAxis(_))));
    }

    #[test]
    fn argmax_of_an_infinite_grid_is_none() {
        let grid = LnMGrid {
            x_values: vec![1.0],
            y_values: vec![1.0],
            values: DMatrix::from_element(1, 1, f64::NEG_INFINITY),
        };
        assert_eq!(grid.argmax(), None);
    }
}

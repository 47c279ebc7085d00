use log::warn;
use nalgebra::{DMatrix, DVector};
use once_cell::sync::OnceCell;

use super::kernel::Kernel;
use super::{GaussianProcess, GaussianProcessError};

/// Structure for making GP predictions
///
/// The mean is computed eagerly; the predictive variance and covariance are
/// computed on first use and cached.
pub struct GaussianProcessPrediction<'a, K>
where
    K: Kernel,
{
    /// Parent GP
    gp: &'a GaussianProcess<K>,
    /// Cross covariance between the test points and the training points
    k_trans: DMatrix<f64>,
    /// Predictive mean
    mean: DVector<f64>,
    /// Solution of `L v = k_trans^T`
    v: OnceCell<DMatrix<f64>>,
    /// Predictive variance
    variance: OnceCell<DVector<f64>>,
    /// Predictive covariance
    cov: OnceCell<DMatrix<f64>>,
    /// Values to predict against
    xs: &'a DMatrix<f64>,
}

impl<'a, K> GaussianProcessPrediction<'a, K>
where
    K: Kernel,
{
    pub(crate) fn new(
        gp: &'a GaussianProcess<K>,
        xs: &'a DMatrix<f64>,
    ) -> Result<Self, GaussianProcessError> {
        if xs.ncols() != gp.x_train.ncols() {
            return Err(GaussianProcessError::DimensionMismatch {
                expected: gp.x_train.ncols(),
                given: xs.ncols(),
            });
        }
        let k_trans = gp.kernel.covariance(xs, &gp.x_train);
        let mean = (&k_trans * &gp.alpha).map(|y| y.mul_add(gp.y_std, gp.y_mean));
        Ok(Self {
            gp,
            k_trans,
            mean,
            v: OnceCell::new(),
            variance: OnceCell::new(),
            cov: OnceCell::new(),
            xs,
        })
    }

    /// Number of test points
    pub fn len(&self) -> usize {
        self.xs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.nrows() == 0
    }

    /// Return the predictive mean
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn v(&self) -> &DMatrix<f64> {
        self.v.get_or_init(|| {
            self.gp
                .l
                .l_dirty()
                .solve_lower_triangular_unchecked(&self.k_trans.transpose())
        })
    }

    /// Return the predictive covariance
    pub fn cov(&self) -> &DMatrix<f64> {
        self.cov.get_or_init(|| {
            let v = self.v();
            let scale = self.gp.y_std * self.gp.y_std;
            (self.gp.kernel.self_covariance(self.xs) - v.transpose() * v) * scale
        })
    }

    /// Return the predictive variance
    ///
    /// Negative values from round-off are set to zero.
    pub fn variance(&self) -> &DVector<f64> {
        self.variance.get_or_init(|| {
            let v = self.v();
            let scale = self.gp.y_std * self.gp.y_std;
            let reduction = v.component_mul(v).row_sum().transpose();
            let mut variance = self.gp.kernel.diag(self.xs) - reduction;

            if variance.iter().any(|&s| s < 0.0) {
                warn!(
                    "Predicted variances smaller than 0. Setting those \
                     variances to 0."
                );
                variance.iter_mut().filter(|s| **s < 0.0).for_each(|s| *s = 0.0);
            }
            variance * scale
        })
    }

    /// Return the standard deviation of the predictive distribution
    pub fn std(&self) -> DVector<f64> {
        self.variance().map(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::gaussian::kernel::{
        ConstantKernel, RBFKernel, WhiteKernel,
    };
    use crate::process::gaussian::GaussianProcessParams;

    fn noisy_gp() -> GaussianProcess<impl Kernel> {
        let x = DMatrix::from_column_slice(6, 1, &[0.0, 0.8, 1.5, 2.7, 3.1, 4.0]);
        let y = DVector::from_column_slice(&[0.1, 0.7, 1.0, 0.4, 0.0, -0.8]);
        let kernel = ConstantKernel::new(0.8).expect("valid")
            * RBFKernel::new(1.2).expect("valid")
            + WhiteKernel::new(0.1).expect("valid");
        GaussianProcess::train(kernel, x, y, GaussianProcessParams::default())
            .expect("positive definite")
    }

    #[test]
    fn variance_is_the_covariance_diagonal() -> Result<(), GaussianProcessError>
    {
        let gp = noisy_gp();
        let xs = DMatrix::from_column_slice(4, 1, &[-1.0, 0.5, 2.0, 6.0]);
        let pred = gp.predict(&xs)?;
        assert_eq!(pred.len(), 4);
        let diag = pred.cov().diagonal();
        assert!(pred.variance().relative_eq(&diag, 1E-10, 1E-10));
        assert!(pred.std().relative_eq(&diag.map(f64::sqrt), 1E-10, 1E-10));
        assert!(pred.cov().relative_eq(&pred.cov().transpose(), 1E-12, 1E-12));
        Ok(())
    }

    #[test]
    fn white_noise_stays_in_the_predictive_variance(
    ) -> Result<(), GaussianProcessError> {
        let gp = noisy_gp();
        // far away only the prior remains: 0.8 + 0.1
        let xs = DMatrix::from_column_slice(1, 1, &[100.0]);
        let pred = gp.predict(&xs)?;
        assert::close(pred.mean()[0], 0.0, 1E-12);
        assert::close(pred.variance()[0], 0.9, 1E-10);
        Ok(())
    }

    #[test]
    fn predict_checks_dimensions() {
        let gp = noisy_gp();
        let xs = DMatrix::zeros(3, 2);
        assert!(matches!(
            gp.predict(&xs),
            Err(GaussianProcessError::DimensionMismatch {
                expected: 1,
                given: 2
            })
        ));
    }

    #[test]
    fn negative_variance_is_clipped() -> Result<(), GaussianProcessError> {
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1E-4, 2E-4]);
        let y = DVector::from_column_slice(&[0.0, 0.0, 0.0]);
        let gp = GaussianProcess::train(
            RBFKernel::new(10.0)?,
            x.clone(),
            y,
            GaussianProcessParams::default(),
        )?;
        let pred = gp.predict(&x)?;
        assert!(pred.variance().iter().all(|&s| s >= 0.0));
        Ok(())
    }
}

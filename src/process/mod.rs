//! Random processes
use nalgebra::DVector;

pub mod gaussian;

/// A random process whose likelihood depends on a vector of parameters
pub trait RandomProcess
where
    Self: Sized,
{
    /// Parameter type
    type Parameter;

    /// Error from evaluating or refitting the process
    type Error: std::error::Error;

    /// Compute the log marginal likelihood
    fn ln_m(&self) -> f64;

    /// Compute the log marginal likelihood with an different set of parameters and compute the
    /// gradient.
    fn ln_m_with_parameters(
        &self,
        parameter: &Self::Parameter,
    ) -> Result<(f64, DVector<f64>), Self::Error>;

    /// Get the parameters
    fn parameters(&self) -> Self::Parameter;

    /// Refit with the given parameters
    fn set_parameters(
        self,
        parameters: &Self::Parameter,
    ) -> Result<Self, Self::Error>;
}

/// Random Process which can be optimized to reach a maximum likelihood estimate.
pub trait RandomProcessMle: RandomProcess {
    /// Run the optimization
    fn optimize(self) -> Result<Self, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::gaussian::kernel::{ConstantKernel, RBFKernel};
    use super::gaussian::{GaussianProcess, GaussianProcessParams};
    use super::*;
    use nalgebra::DMatrix;

    fn mle<P: RandomProcessMle>(process: P) -> Result<P, P::Error> {
        process.optimize()
    }

    #[test]
    fn optimize_through_the_trait() {
        let x = DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
        let y: DVector<f64> = x.map(|x: f64| x.sin()).column(0).into();
        let kernel = ConstantKernel::new(1.0).unwrap() * RBFKernel::new(1.0).unwrap();
        let gp = GaussianProcess::train(kernel, x, y, GaussianProcessParams::default())
            .unwrap();
        let before = RandomProcess::ln_m(&gp);
        let gp = mle(gp).unwrap();
        assert!(RandomProcess::ln_m(&gp) > before);
        assert::close(RandomProcess::ln_m(&gp), -3.414_870_1, 1E-6);
    }
}

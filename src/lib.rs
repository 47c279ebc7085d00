//! Gaussian process regression
//!
//! Fit a Gaussian process to data, choose its kernel hyperparameters by
//! maximizing the log marginal likelihood, and predict at new points.
//!
//! ```
//! use gpr::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let x = DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
//! let y: DVector<f64> = x.map(|x: f64| x.sin()).column(0).into();
//!
//! let kernel = ConstantKernel::new(1.0)? * RBFKernel::new(1.0)?;
//! let gp = GaussianProcess::fit(kernel, x, y, GaussianProcessParams::default())?;
//!
//! let xs = DMatrix::from_column_slice(2, 1, &[0.0, 2.0]);
//! let pred = gp.predict(&xs)?;
//! assert_eq!(pred.mean().len(), 2);
//! # Ok::<(), GaussianProcessError>(())
//! ```
pub mod consts;
pub mod prelude;
pub mod process;

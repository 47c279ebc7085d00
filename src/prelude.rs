//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::process::gaussian::kernel::{
    AddKernel, Bounds, ConstantKernel, Hyperparameter, Kernel, KernelError,
    ProductKernel, RBFKernel, WhiteKernel,
};
#[doc(no_inline)]
pub use crate::process::gaussian::{
    Axis, GaussianProcess, GaussianProcessError, GaussianProcessParams,
    GaussianProcessPrediction, LbfgsParams, LnMGrid, LnMSurface, NoiseModel,
    OptimizationReport, Status,
};
#[doc(no_inline)]
pub use crate::process::{RandomProcess, RandomProcessMle};

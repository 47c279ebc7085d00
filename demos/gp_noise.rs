//! Fit a noisy sine wave from two different starting kernels and show that
//! the log marginal likelihood has two local maxima: a long length scale
//! explaining everything as noise, and a short one fitting the signal.
use nalgebra::{DMatrix, DVector};

use gpr::prelude::*;
use gpr::process::gaussian::logspace;

const X: [f64; 20] = [
    2.7440675196366238,
    3.5759468318620975,
    3.0138168803582195,
    2.724415914984484,
    2.1182739966945237,
    3.2294705653332807,
    2.1879360563134624,
    4.4588650039103985,
    4.818313802505147,
    1.9172075941288886,
    3.958625190413323,
    2.644474598764522,
    2.8402228054696614,
    4.627983191463305,
    0.3551802909894347,
    0.43564649850770354,
    0.1010919872016286,
    4.16309922773969,
    3.8907837547492523,
    4.3500607412340955,
];

// standard normal draws
const N: [f64; 20] = [
    1.62434536,
    -0.61175641,
    -0.52817175,
    -1.07296862,
    0.86540763,
    -2.3015387,
    1.74481176,
    -0.7612069,
    0.3190391,
    -0.24937038,
    1.46210794,
    -2.06014071,
    -0.3224172,
    -0.38405435,
    1.13376944,
    -1.09989127,
    -0.17242821,
    -0.87785842,
    0.04221375,
    0.58281521,
];

fn fit(
    kernel: ProductKernel<ConstantKernel, RBFKernel>,
    noise: WhiteKernel,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> Result<GaussianProcess<impl Kernel>, GaussianProcessError> {
    let gp = GaussianProcess::fit(
        kernel + noise,
        x.clone(),
        y.clone(),
        GaussianProcessParams::default()
            .with_noise_model(NoiseModel::Uniform(0.0)),
    )?;
    println!("Kernel: {}", gp.kernel());
    println!("Log marginal likelihood: {:.3}", gp.ln_m());
    if let Some(report) = gp.optimization_report() {
        let run = report.best_run();
        println!("  {} after {} iterations", run.status, run.n_iter);
    }
    Ok(gp)
}

pub fn main() -> Result<(), GaussianProcessError> {
    env_logger::builder().init();

    let x = DMatrix::from_column_slice(X.len(), 1, &X);
    let y = DVector::from_iterator(
        X.len(),
        X.iter()
            .zip(N.iter())
            .map(|(x, e)| 0.3_f64.mul_add(*e, 0.5 + (3.0 * x).sin())),
    );

    // First run: everything is noise
    let kernel = ConstantKernel::new(1.0)?
        * RBFKernel::new(10.0)?.with_bounds(Bounds::new(1E-2, 1E3)?);
    let noise = WhiteKernel::new(1.0)?.with_bounds(Bounds::new(1E-5, 1E1)?);
    let gp_long = fit(kernel, noise, &x, &y)?;

    // Second run: short length scale, small noise
    let kernel = ConstantKernel::new(1.0)?
        * RBFKernel::new(0.1)?.with_bounds(Bounds::new(1E-2, 1E3)?);
    let noise = WhiteKernel::new(1E-2)?.with_bounds(Bounds::new(1E-10, 1E1)?);
    let gp = fit(kernel, noise, &x, &y)?;

    let xs = DMatrix::from_iterator(
        100,
        1,
        (0..100).map(|i| 5.0 * f64::from(i) / 99.0),
    );
    for (name, model) in [("long", &gp_long), ("short", &gp)] {
        let pred = model.predict(&xs)?;
        println!(
            "{name}: mean in [{:.3}, {:.3}], max std {:.3}",
            pred.mean().min(),
            pred.mean().max(),
            pred.std().max()
        );
    }

    // Log marginal likelihood over length scale and noise level with the
    // constant fixed at 0.36
    let kernel = gp.kernel();
    let mut base = kernel.parameters();
    base[kernel.parameter_index("k1__k1__constant_value")?] = 0.36_f64.ln();
    let surface = LnMSurface::new(
        base,
        Axis::by_name(kernel, "k1__k2__length_scale", logspace(-2.0, 4.0, 50))?,
        Axis::by_name(kernel, "k2__noise_level", logspace(-2.0, 1.0, 50))?,
    );
    let grid = surface.evaluate(&gp)?;
    if let Some((length_scale, noise_level, ln_m)) = grid.argmax() {
        println!(
            "Grid maximum {:.3} at length_scale = {:.3}, noise_level = {:.3}",
            ln_m, length_scale, noise_level
        );
    }
    Ok(())
}
